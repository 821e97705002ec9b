use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use log::info;

use base::defs::{Error, ErrorKind::*, Result};
use base::util::fs;

use crate::mesh::Mesh;
use crate::misc::{Point3, Vector2};

const MAX_NUM_FACE_VERTICES: usize = 10;

pub fn load_mesh<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let path = path.as_ref();
    let mesh = import_obj(fs::open_file(path)?)?;
    info!(
        "  loaded mesh '{}' with {} vertices and {} faces",
        path.display(),
        mesh.vertices.len(),
        mesh.faces.len()
    );
    Ok(mesh)
}

pub fn import_obj<R: Read>(obj_reader: R) -> Result<Mesh> {
    let mut state = ImportState::default();

    for line_res in BufReader::new(obj_reader).lines() {
        let line = line_res?;
        state.line += 1;

        let parts: Vec<&str> = line.split_whitespace().collect();
        if !parts.is_empty() {
            match parts[0] {
                "f" => import_f(&mut state, &parts)?,
                "v" => import_v(&mut state, &parts)?,
                "vt" => import_vt(&mut state, &parts)?,
                _ => (),
            }
        }
    }

    state.mesh.validate()?;
    Ok(state.mesh)
}

#[derive(Default)]
struct ImportState {
    line: usize,
    mesh: Mesh,
}

fn import_f(state: &mut ImportState, parts: &[&str]) -> Result<()> {
    let num_vertices_err_res = |kind, prop| {
        let msg = "number of vertices in f-statement at line";
        Err(Error::new(kind, format!("{} {} {}", prop, msg, state.line)))
    };
    if parts.len() < 4 {
        return num_vertices_err_res(MalformedData, "bad");
    } else if parts.len() > MAX_NUM_FACE_VERTICES + 1 {
        return num_vertices_err_res(UnsupportedFeature, "unsupported");
    }

    let mut face_vertices = [(0, 0); MAX_NUM_FACE_VERTICES];

    for (i, part) in parts[1..].iter().enumerate() {
        let mut iter = part.split('/');
        let vertex = parse_f_component(state, &mut iter, i + 1, "vertex")?;
        let texture = parse_f_component(state, &mut iter, i + 1, "texture")?;
        face_vertices[i] = (vertex, texture);
    }

    let line = state.line;
    let check = |index: usize, len: usize, what: &str| {
        if index > len {
            let desc = format!(
                "reference to unknown {} {} in f-statement at line {}",
                what, index, line
            );
            Err(Error::new(InconsistentState, desc))
        } else {
            Ok(index - 1)
        }
    };

    // Polygons are split into a triangle fan.
    let len = parts.len() - 1;
    for i in 0..len - 2 {
        let corners =
            [face_vertices[i], face_vertices[i + 1], face_vertices[len - 1]];
        let mut face = [0; 3];
        let mut uv_face = [0; 3];
        for (k, &(v, t)) in corners.iter().enumerate() {
            face[k] = check(v, state.mesh.vertices.len(), "vertex")?;
            uv_face[k] =
                check(t, state.mesh.uv_coords.len(), "texture coordinate")?;
        }
        state.mesh.faces.push(face);
        state.mesh.uv_faces.push(uv_face);
    }

    Ok(())
}

fn parse_f_component(
    state: &ImportState,
    iter: &mut std::str::Split<char>,
    vnum: usize,
    what: &str,
) -> Result<usize> {
    let component: &str = iter.next().unwrap_or_default();

    let num = component.parse::<usize>().unwrap_or_default();
    if num != 0 {
        Ok(num)
    } else {
        let desc = format!(
            "malformed {} of vertex {} in f-statement at line {}",
            what, vnum, state.line
        );
        Err(Error::new(MalformedData, desc))
    }
}

fn import_v(state: &mut ImportState, parts: &[&str]) -> Result<()> {
    if parts.len() < 4 || parts.len() > 5 {
        return Err(Error::new(
            MalformedData,
            format!("malformed v-statement at line {}", state.line),
        ));
    }

    let x = parse_coord("x-coordinate of v-statement", state.line, parts[1])?;
    let y = parse_coord("y-coordinate of v-statement", state.line, parts[2])?;
    let z = parse_coord("z-coordinate of v-statement", state.line, parts[3])?;

    state.mesh.vertices.push(Point3::new(x, y, z));

    Ok(())
}

fn import_vt(state: &mut ImportState, parts: &[&str]) -> Result<()> {
    if parts.len() < 3 || parts.len() > 4 {
        return Err(Error::new(
            MalformedData,
            format!("malformed vt-statement at line {}", state.line),
        ));
    }

    let u = parse_coord("u-coordinate of vt-statement", state.line, parts[1])?;
    let v = parse_coord("v-coordinate of vt-statement", state.line, parts[2])?;

    state.mesh.uv_coords.push(Vector2::new(u, v));

    Ok(())
}

fn parse_coord(what: &str, line: usize, str: &str) -> Result<f64> {
    match str.parse::<f64>() {
        Ok(val) => Ok(val),
        Err(_) => Err(Error::new(
            MalformedData,
            format!("failed to parse {} at line {}", what, line),
        )),
    }
}
