use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};

/// Reads one class name per line. A trailing `,r,g,b` colour suffix is
/// accepted and ignored; blank lines are skipped.
pub fn load_class_names(filepath: &Path) -> io::Result<Vec<String>> {
    let file = File::open(filepath)?;
    parse_class_names(io::BufReader::new(file))
}

fn parse_class_names(reader: impl BufRead) -> io::Result<Vec<String>> {
    let mut class_names = Vec::new();

    for line_result in reader.lines() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split(',').collect();
        match parts.len() {
            1 | 4 => class_names.push(parts[0].trim().to_string()),
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Invalid line format: {}", line),
                ))
            }
        }
    }

    Ok(class_names)
}

pub fn class_name(class_names: &[String], class_id: usize) -> String {
    class_names
        .get(class_id)
        .cloned()
        .unwrap_or_else(|| format!("class_{}", class_id))
}
