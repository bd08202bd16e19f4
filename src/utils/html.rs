use ammonia::Builder;

/// Longest question name shown in a column header.
const HEADER_MAX_CHARS: usize = 80;

/// Entities ammonia writes back when it serializes text.
const ENTITIES: [(&str, char); 4] = [("&amp;", '&'), ("&lt;", '<'), ("&gt;", '>'), ("&nbsp;", '\u{a0}')];

/// Turns an authored question name into plain column header text.
///
/// All markup is stripped (the text inside ordinary tags is kept, `<script>`
/// and `<style>` bodies are dropped) and the result is cut to 80 characters.
pub fn header_text(input: &str) -> String {
    let stripped = Builder::empty().clean(input).to_string();
    unescape(&stripped).trim().chars().take(HEADER_MAX_CHARS).collect()
}

fn unescape(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut rest = escaped;
    while let Some(at) = rest.find('&') {
        out.push_str(&rest[..at]);
        rest = &rest[at..];
        match ENTITIES.iter().find(|(entity, _)| rest.starts_with(entity)) {
            Some((entity, ch)) => {
                out.push(*ch);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
