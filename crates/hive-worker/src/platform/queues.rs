/// Lower-case, spaces to `_`, quotes removed; empty names dropped and duplicates
/// removed, keeping first occurrence.
pub fn normalize_queue_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let name: String = name
            .as_ref()
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| *c != '"' && *c != '\'')
            .map(|c| if c == ' ' { '_' } else { c })
            .collect();
        if !name.is_empty() && !out.contains(&name) {
            out.push(name);
        }
    }
    out
}
