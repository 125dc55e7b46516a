use crate::schema::DatasetSchema;
use crate::types::Result;
use std::io::Write;
use std::path::Path;

/// Write schema to JSON file
pub fn write_json_file(schema: &DatasetSchema, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, schema)?;
    writer.flush()?;
    Ok(())
}

/// Write schema to JSON string
pub fn to_json_string(schema: &DatasetSchema) -> Result<String> {
    Ok(serde_json::to_string_pretty(schema)?)
}

/// Write schema to stdout
pub fn write_json_stdout(schema: &DatasetSchema) -> Result<()> {
    let json = to_json_string(schema)?;
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", json)?;
    Ok(())
}
