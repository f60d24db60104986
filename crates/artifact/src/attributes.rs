//! Lexing of the attribute section of an opening tag.

/// Index of the `>` that ends a tag, ignoring any `>` inside quoted values.
///
/// `src` starts just after the tag name. Only the first `limit` bytes are
/// examined so corrupt input cannot hold the parser indefinitely. A tag
/// never spans lines: a newline before the closing `>` makes it malformed,
/// even inside an unterminated quote.
pub(crate) fn find_tag_end(src: &str, limit: usize) -> TagEnd {
    let mut quote: Option<char> = None;
    for (i, c) in src.char_indices() {
        if i >= limit {
            return TagEnd::TooLong;
        }
        match (quote, c) {
            (_, '\n') => return TagEnd::Malformed,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return TagEnd::At(i),
            (None, _) => {}
        }
    }
    if src.len() >= limit {
        TagEnd::TooLong
    } else {
        TagEnd::Incomplete
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TagEnd {
    At(usize),
    Incomplete,
    TooLong,
    Malformed,
}

/// Split `name=value` pairs. Values may be double-quoted, single-quoted or
/// bare. A name without `=` yields an empty value.
pub(crate) fn parse(src: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    let mut chars = src.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut name = String::new();
        while let Some(c) = chars.next_if(|c| !c.is_whitespace() && *c != '=' && *c != '/') {
            name.push(c);
        }
        if name.is_empty() {
            // stray '/' or '='
            chars.next();
            continue;
        }

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let mut value = String::new();
        if chars.next_if_eq(&'=').is_some() {
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            match chars.peek().copied() {
                Some(q @ ('"' | '\'')) => {
                    chars.next();
                    for c in chars.by_ref() {
                        if c == q {
                            break;
                        }
                        value.push(c);
                    }
                }
                _ => {
                    while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                        value.push(c);
                    }
                }
            }
        }
        attrs.push((name, value));
    }

    attrs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
        attrs.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    #[test]
    fn quoted_and_bare_values() {
        let attrs = parse(r#" type="file" filePath='src/App.tsx' mode=fast"#);
        assert_eq!(get(&attrs, "type"), Some("file"));
        assert_eq!(get(&attrs, "filePath"), Some("src/App.tsx"));
        assert_eq!(get(&attrs, "mode"), Some("fast"));
    }

    #[test]
    fn spaces_inside_quotes_are_kept() {
        let attrs = parse(r#"type = "shell" title="Install deps""#);
        assert_eq!(get(&attrs, "type"), Some("shell"));
        assert_eq!(get(&attrs, "title"), Some("Install deps"));
    }

    #[test]
    fn valueless_and_stray_characters() {
        let attrs = parse(r#" checked / type="file""#);
        assert_eq!(get(&attrs, "checked"), Some(""));
        assert_eq!(get(&attrs, "type"), Some("file"));
    }

    #[test]
    fn tag_end_stops_at_newline_inside_unterminated_quote() {
        let src = " type=\"file filePath=\"a.txt\">\nx\n</boltAction>";
        assert_eq!(find_tag_end(src, 1024), TagEnd::Malformed);
        assert_eq!(find_tag_end(" type=\"shell\"\n>", 1024), TagEnd::Malformed);
    }

    #[test]
    fn tag_end_skips_quoted_gt() {
        let src = r#" type="shell" title="a > b">echo"#;
        assert_eq!(find_tag_end(src, 1024), TagEnd::At(src.find(">echo").unwrap()));
    }

    #[test]
    fn tag_end_incomplete_and_too_long() {
        assert_eq!(find_tag_end(r#" type="fi"#, 1024), TagEnd::Incomplete);
        assert_eq!(find_tag_end(&" x".repeat(100), 64), TagEnd::TooLong);
    }
}
