//! MIME type assignment from the settings' mime table

use cachefront_settings::MimeRule;

/// Last dot-separated segment of a file name, or the whole name without a dot
pub fn extension(file_name: &str) -> &str {
    file_name
        .rsplit_once('.')
        .map_or(file_name, |(_, ext)| ext)
}

/// Content type of the first rule matching the file's extension
pub fn lookup<'a>(rules: &'a [MimeRule], file_name: &str) -> Option<&'a str> {
    let ext = extension(file_name);
    rules
        .iter()
        .find(|rule| rule.pattern.is_match(ext))
        .map(|rule| rule.content_type.as_str())
}
