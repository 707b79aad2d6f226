//! OBJ file loader for 3D models
//!
//! Produces plain vertex/index data only; nothing here touches the GPU, so
//! the loader is safe to run on import worker threads.
//!
//! Supported: `v`, `vt`, `vn`, polygonal `f` (fan triangulated, negative
//! indices allowed), `o`/`g` groups and `usemtl` switches (each starts a new
//! mesh), and `mtllib` for diffuse texture lookup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::assets::mtl_parser::{MtlData, MtlParser};
use crate::render::mesh::Vertex;

/// OBJ parsing failures
#[derive(Error, Debug)]
pub enum ObjError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed number or index
    #[error("Parse error on line {line}: {message}")]
    ParseError {
        /// 1-based line number
        line: usize,
        /// What went wrong
        message: String,
    },
    /// Structurally invalid file
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// One mesh of an imported file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedMesh {
    /// Group or object name, if any
    pub name: String,
    /// De-duplicated vertices
    pub vertices: Vec<Vertex>,
    /// Triangle indices
    pub indices: Vec<u32>,
    /// Whether the file supplied normals for this mesh
    pub has_normals: bool,
    /// Diffuse texture resolved from the material library
    pub diffuse_texture: Option<PathBuf>,
}

/// Result of importing one model file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedScene {
    /// Source file
    pub source: PathBuf,
    /// Non-empty meshes in file order
    pub meshes: Vec<ImportedMesh>,
}

impl ImportedScene {
    /// Total vertices over every mesh
    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.vertices.len()).sum()
    }
}

#[derive(Default)]
struct MeshBuilder {
    mesh: ImportedMesh,
    lookup: HashMap<(usize, Option<usize>, Option<usize>), u32>,
}

impl MeshBuilder {
    fn named(name: &str) -> Self {
        Self {
            mesh: ImportedMesh { name: name.to_string(), ..Default::default() },
            lookup: HashMap::new(),
        }
    }
}

/// Wavefront OBJ loader
pub struct ObjLoader;

impl ObjLoader {
    /// Load an OBJ file; `mtllib` references resolve next to it
    pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<ImportedScene, ObjError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut scene = Self::parse(&contents, path.parent())?;
        scene.source = path.to_path_buf();
        Ok(scene)
    }

    /// Parse OBJ text
    ///
    /// # Arguments
    /// * `contents` - OBJ source text
    /// * `base_dir` - Directory for `mtllib` and texture lookup; `None` skips materials
    pub fn parse(contents: &str, base_dir: Option<&Path>) -> Result<ImportedScene, ObjError> {
        let mut positions: Vec<[f32; 3]> = Vec::new();
        let mut normals: Vec<[f32; 3]> = Vec::new();
        let mut tex_coords: Vec<[f32; 2]> = Vec::new();
        let mut materials: HashMap<String, MtlData> = HashMap::new();

        let mut finished: Vec<ImportedMesh> = Vec::new();
        let mut current = MeshBuilder::named("default");
        let mut active_texture: Option<PathBuf> = None;

        for (line_idx, raw) in contents.lines().enumerate() {
            let line_num = line_idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            match parts[0] {
                "v" => positions.push(Self::parse_floats::<3>(&parts, line_num)?),
                "vn" => normals.push(Self::parse_floats::<3>(&parts, line_num)?),
                "vt" => tex_coords.push(Self::parse_floats::<2>(&parts, line_num)?),
                "o" | "g" => {
                    let name = parts.get(1).copied().unwrap_or("unnamed");
                    Self::start_mesh(&mut finished, &mut current, name);
                    current.mesh.diffuse_texture = active_texture.clone();
                }
                "mtllib" => {
                    if let (Some(dir), Some(file)) = (base_dir, parts.get(1)) {
                        materials.extend(Self::load_materials(&dir.join(file)));
                    }
                }
                "usemtl" => {
                    let name = current.mesh.name.clone();
                    if !current.mesh.indices.is_empty() {
                        Self::start_mesh(&mut finished, &mut current, &name);
                    }
                    active_texture = parts
                        .get(1)
                        .and_then(|m| materials.get(*m))
                        .and_then(|m| m.diffuse_map.as_ref())
                        .and_then(|map| base_dir.map(|dir| dir.join(map)));
                    current.mesh.diffuse_texture = active_texture.clone();
                }
                "f" => {
                    if parts.len() < 4 {
                        return Err(ObjError::ParseError {
                            line: line_num,
                            message: "face needs at least 3 vertices".to_string(),
                        });
                    }
                    let mut face = Vec::with_capacity(parts.len() - 1);
                    for token in &parts[1..] {
                        let key = Self::parse_face_vertex(
                            token,
                            line_num,
                            positions.len(),
                            tex_coords.len(),
                            normals.len(),
                        )?;
                        let index = match current.lookup.get(&key) {
                            Some(&index) => index,
                            None => {
                                let (p, t, n) = key;
                                let vertex = Vertex {
                                    position: positions[p],
                                    tex_coord: t.map_or([0.0, 0.0], |t| tex_coords[t]),
                                    normal: n.map_or([0.0, 1.0, 0.0], |n| normals[n]),
                                };
                                current.mesh.has_normals |= n.is_some();
                                current.mesh.vertices.push(vertex);
                                let index = (current.mesh.vertices.len() - 1) as u32;
                                current.lookup.insert(key, index);
                                index
                            }
                        };
                        face.push(index);
                    }
                    for i in 1..(face.len() - 1) {
                        current.mesh.indices.extend_from_slice(&[face[0], face[i], face[i + 1]]);
                    }
                }
                _ => {}
            }
        }

        if !current.mesh.indices.is_empty() {
            finished.push(current.mesh);
        }
        if finished.is_empty() {
            return Err(ObjError::InvalidFormat("No faces found in OBJ file".to_string()));
        }

        Ok(ImportedScene { source: PathBuf::new(), meshes: finished })
    }

    fn start_mesh(finished: &mut Vec<ImportedMesh>, current: &mut MeshBuilder, name: &str) {
        let previous = std::mem::replace(current, MeshBuilder::named(name));
        if !previous.mesh.indices.is_empty() {
            finished.push(previous.mesh);
        }
    }

    fn load_materials(path: &Path) -> HashMap<String, MtlData> {
        match std::fs::read_to_string(path).map_err(|e| e.to_string()).and_then(|s| MtlParser::parse(&s)) {
            Ok(materials) => materials,
            Err(e) => {
                log::warn!("Ignoring material library {:?}: {}", path, e);
                HashMap::new()
            }
        }
    }

    fn parse_floats<const N: usize>(parts: &[&str], line: usize) -> Result<[f32; N], ObjError> {
        let mut out = [0.0; N];
        for (i, slot) in out.iter_mut().enumerate() {
            let token = parts.get(i + 1).ok_or_else(|| ObjError::ParseError {
                line,
                message: format!("'{}' expects {} components", parts[0], N),
            })?;
            *slot = token.parse().map_err(|_| ObjError::ParseError {
                line,
                message: format!("invalid number '{}'", token),
            })?;
        }
        Ok(out)
    }

    fn resolve_index(token: &str, count: usize, line: usize) -> Result<usize, ObjError> {
        let raw: i64 = token.parse().map_err(|_| ObjError::ParseError {
            line,
            message: format!("invalid index '{}'", token),
        })?;
        let resolved = if raw < 0 { count as i64 + raw } else { raw - 1 };
        if resolved < 0 || resolved as usize >= count {
            return Err(ObjError::ParseError { line, message: format!("index {} out of bounds", raw) });
        }
        Ok(resolved as usize)
    }

    fn parse_face_vertex(
        token: &str,
        line: usize,
        position_count: usize,
        tex_count: usize,
        normal_count: usize,
    ) -> Result<(usize, Option<usize>, Option<usize>), ObjError> {
        let mut fields = token.split('/');
        let position = Self::resolve_index(fields.next().unwrap_or(""), position_count, line)?;
        let tex = match fields.next() {
            Some(t) if !t.is_empty() => Some(Self::resolve_index(t, tex_count, line)?),
            _ => None,
        };
        let normal = match fields.next() {
            Some(n) if !n.is_empty() => Some(Self::resolve_index(n, normal_count, line)?),
            _ => None,
        };
        Ok((position, tex, normal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vn 0 0 1
f 1//1 2//1 3//1 4//1
";

    #[test]
    fn test_quad_is_fan_triangulated() {
        let scene = ObjLoader::parse(QUAD, None).unwrap();
        assert_eq!(scene.meshes.len(), 1);
        let mesh = &scene.meshes[0];
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert!(mesh.has_normals);
    }

    #[test]
    fn test_negative_indices_and_shared_vertices() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\nf -4 -3 -2\nf -3 -1 -2\n";
        let mesh = &ObjLoader::parse(obj, None).unwrap().meshes[0];
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 1, 3, 2]);
        assert!(!mesh.has_normals);
    }

    #[test]
    fn test_groups_become_meshes() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\ng left\nf 1 2 3\ng right\nf 3 2 1\n";
        let scene = ObjLoader::parse(obj, None).unwrap();
        let names: Vec<&str> = scene.meshes.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["left", "right"]);
    }

    #[test]
    fn test_out_of_bounds_index_fails() {
        let result = ObjLoader::parse("v 0 0 0\nf 1 2 3\n", None);
        assert!(matches!(result, Err(ObjError::ParseError { line: 2, .. })));
    }

    #[test]
    fn test_file_without_faces_is_invalid() {
        assert!(matches!(ObjLoader::parse("v 0 0 0\n", None), Err(ObjError::InvalidFormat(_))));
    }

    #[test]
    fn test_usemtl_resolves_diffuse_texture() {
        let dir = std::env::temp_dir().join(format!("tav_obj_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("cube.mtl"), "newmtl grass\nmap_Kd grass_block.png\n").unwrap();
        std::fs::write(dir.join("cube.obj"), format!("mtllib cube.mtl\nusemtl grass\n{}", QUAD)).unwrap();

        let scene = ObjLoader::load_obj(dir.join("cube.obj")).unwrap();
        assert_eq!(scene.meshes[0].diffuse_texture, Some(dir.join("grass_block.png")));
        assert_eq!(scene.source, dir.join("cube.obj"));
    }
}
