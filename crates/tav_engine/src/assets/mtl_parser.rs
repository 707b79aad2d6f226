//! MTL (Material Template Library) file parser
//!
//! Only the parts the renderer consumes are kept: the diffuse colour and the
//! diffuse texture map of each material.

use std::collections::HashMap;

use crate::foundation::math::Vec3;

/// Parsed MTL material data
#[derive(Debug, Clone, PartialEq)]
pub struct MtlData {
    /// Material name
    pub name: String,
    /// Diffuse color (Kd)
    pub diffuse: Vec3,
    /// Diffuse texture map (map_Kd), relative to the MTL file
    pub diffuse_map: Option<String>,
}

impl Default for MtlData {
    fn default() -> Self {
        Self {
            name: String::new(),
            diffuse: Vec3::new(0.8, 0.8, 0.8),
            diffuse_map: None,
        }
    }
}

/// MTL file parser
pub struct MtlParser;

impl MtlParser {
    /// Parse MTL file contents into a map of material name -> MtlData
    ///
    /// # Arguments
    /// * `contents` - The text contents of the MTL file
    ///
    /// # Returns
    /// A HashMap mapping material names to their parsed data
    pub fn parse(contents: &str) -> Result<HashMap<String, MtlData>, String> {
        let mut materials = HashMap::new();
        let mut current: Option<MtlData> = None;

        for (line_num, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut tokens = line.split_whitespace();
            let Some(command) = tokens.next() else { continue };

            match command {
                "newmtl" => {
                    if let Some(mat) = current.take() {
                        materials.insert(mat.name.clone(), mat);
                    }
                    let name = tokens
                        .next()
                        .ok_or_else(|| format!("Line {}: newmtl missing material name", line_num + 1))?
                        .to_string();
                    current = Some(MtlData { name, ..Default::default() });
                }
                "Kd" => {
                    if let Some(ref mut mat) = current {
                        mat.diffuse = Self::parse_vec3(&mut tokens, line_num, "Kd")?;
                    }
                }
                "map_Kd" => {
                    if let Some(ref mut mat) = current {
                        // The file name is the last token; earlier ones are map options.
                        mat.diffuse_map = tokens.last().map(str::to_string);
                    }
                }
                _ => {}
            }
        }

        if let Some(mat) = current {
            materials.insert(mat.name.clone(), mat);
        }
        Ok(materials)
    }

    fn parse_vec3<'a>(
        tokens: &mut impl Iterator<Item = &'a str>,
        line_num: usize,
        field: &str,
    ) -> Result<Vec3, String> {
        let mut next = || -> Result<f32, String> {
            tokens
                .next()
                .ok_or_else(|| format!("Line {}: {} expects 3 components", line_num + 1, field))?
                .parse::<f32>()
                .map_err(|e| format!("Line {}: invalid {} component: {}", line_num + 1, field, e))
        };
        Ok(Vec3::new(next()?, next()?, next()?))
    }
}
