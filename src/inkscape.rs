//! Inkscape command line
//!
//! Each call writes the document to a temporary `.svg` file and runs the
//! program once for the whole batch.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

use crate::error::{ExportError, Result};
use crate::types::BBox;

/// One PNG to export: the element id and the target file
#[derive(Debug, Clone, PartialEq)]
pub struct ExportDirective {
    pub id: String,
    pub filename: PathBuf,
}

/// Renders elements of a document to PNG files
pub trait Rasterizer {
    fn rasterize(&self, svg: &str, directives: &[ExportDirective], dpi: f64) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct Inkscape {
    program: PathBuf,
}

impl Default for Inkscape {
    fn default() -> Self {
        Self::new("inkscape")
    }
}

impl Inkscape {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run Inkscape on `svg` and return its standard output
    pub fn run(&self, svg: &str, args: &[String]) -> Result<String> {
        let mut file = tempfile::Builder::new()
            .prefix("inkscape_call")
            .suffix(".svg")
            .tempfile()?;
        file.write_all(svg.as_bytes())?;
        file.flush()?;

        let program = self.program.display().to_string();
        log::debug!("Running {} {:?}", program, args);

        let output = Command::new(&self.program)
            .arg(file.path())
            .args(args)
            .output()
            .map_err(|e| ExportError::Process {
                program: program.clone(),
                status: "not started".to_string(),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ExportError::Process {
                program,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Visual bounding boxes of `ids`, in one call
    pub fn query_bounds(&self, svg: &str, ids: &[String]) -> Result<HashMap<String, BBox>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let args = vec![
            format!("--query-id={}", ids.join(",")),
            "--query-x".to_string(),
            "--query-y".to_string(),
            "--query-width".to_string(),
            "--query-height".to_string(),
        ];
        let output = self.run(svg, &args)?;
        parse_query_output(&output, ids)
    }
}

impl Rasterizer for Inkscape {
    fn rasterize(&self, svg: &str, directives: &[ExportDirective], dpi: f64) -> Result<()> {
        if directives.is_empty() {
            return Ok(());
        }
        let args = vec![
            format!("--actions={}", export_actions(directives)),
            format!("--export-dpi={}", dpi),
        ];
        self.run(svg, &args)?;
        log::info!("Rasterized {} sprite image(s)", directives.len());
        Ok(())
    }
}

/// Action list exporting every directive in turn
pub fn export_actions(directives: &[ExportDirective]) -> String {
    directives
        .iter()
        .map(|d| {
            format!(
                "export-id:{};export-id-only;export-filename:{};export-do",
                d.id,
                d.filename.display()
            )
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Parse the four lines printed by `--query-x --query-y --query-width
/// --query-height`, each holding one comma-separated value per id.
pub fn parse_query_output(output: &str, ids: &[String]) -> Result<HashMap<String, BBox>> {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.len() < 4 {
        return Err(ExportError::Query(format!(
            "expected 4 lines, got {}",
            lines.len()
        )));
    }

    let mut columns = Vec::with_capacity(4);
    for (name, line) in ["x", "y", "width", "height"].iter().zip(&lines) {
        let values = line
            .split(',')
            .map(|v| {
                v.trim()
                    .parse::<f64>()
                    .map_err(|_| ExportError::Query(format!("bad {} value '{}'", name, v)))
            })
            .collect::<Result<Vec<f64>>>()?;
        if values.len() != ids.len() {
            return Err(ExportError::Query(format!(
                "{} line has {} value(s) for {} id(s)",
                name,
                values.len(),
                ids.len()
            )));
        }
        columns.push(values);
    }

    Ok(ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            (
                id.clone(),
                BBox::new(columns[0][i], columns[1][i], columns[2][i], columns[3][i]),
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_query_output() {
        let out = "10,20.5\n1,2\n30,40\n50,60\n";
        let boxes = parse_query_output(out, &ids(&["a", "b"])).unwrap();
        assert_eq!(boxes["a"], BBox::new(10.0, 1.0, 30.0, 50.0));
        assert_eq!(boxes["b"], BBox::new(20.5, 2.0, 40.0, 60.0));
    }

    #[test]
    fn test_parse_query_output_windows_newlines() {
        let out = "1\r\n2\r\n3\r\n4\r\n";
        let boxes = parse_query_output(out, &ids(&["g"])).unwrap();
        assert_eq!(boxes["g"], BBox::new(1.0, 2.0, 3.0, 4.0));
    }

    #[test]
    fn test_parse_query_output_errors() {
        assert!(matches!(
            parse_query_output("1\n2\n3\n", &ids(&["a"])),
            Err(ExportError::Query(_))
        ));
        assert!(matches!(
            parse_query_output("1\n2\n3\nnope\n", &ids(&["a"])),
            Err(ExportError::Query(_))
        ));
        assert!(matches!(
            parse_query_output("1,2\n2\n3\n4\n", &ids(&["a"])),
            Err(ExportError::Query(_))
        ));
    }

    #[test]
    fn test_export_actions() {
        let directives = vec![
            ExportDirective {
                id: "house".to_string(),
                filename: PathBuf::from("out/House.png"),
            },
            ExportDirective {
                id: "tree".to_string(),
                filename: PathBuf::from("out/Tree.png"),
            },
        ];
        assert_eq!(
            export_actions(&directives),
            "export-id:house;export-id-only;export-filename:out/House.png;export-do;\
             export-id:tree;export-id-only;export-filename:out/Tree.png;export-do"
        );
    }

    #[test]
    fn test_missing_program_is_process_error() {
        let inkscape = Inkscape::new("/nonexistent/inkscape-binary");
        let err = inkscape.run("<svg/>", &[]).unwrap_err();
        assert!(matches!(err, ExportError::Process { .. }));
    }
}
