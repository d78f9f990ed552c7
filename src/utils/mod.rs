pub mod logger;

/// Name used for the de-identified copy of an uploaded file
pub fn deidentified_file_name(original: &str) -> String {
    let name = original
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("upload.csv");
    format!("deidentified_{}", name)
}
