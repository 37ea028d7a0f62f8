//! Decorator tokenizer: turns one raw annotation chunk into ordered
//! `@name [hint] [payload]` tokens. Pure lexing, no semantics.

#[derive(Debug, Clone, PartialEq)]
pub struct DecoratorToken {
    pub name: String,
    /// Bracketed payload text (`{...}` or `[...]`), captured verbatim.
    pub payload: Option<String>,
    /// Bare token between the name and any payload, e.g. the abstraction
    /// name in `@include Base` or the field spec in `@unique a+b`.
    pub field_hint: Option<String>,
}

/// Tokenize a raw decorator chunk, stripping a leading `%%` marker.
///
/// Payload scanning is bracket-depth aware and tracks single/double
/// quoted spans (with backslash escapes), so embedded commas, braces and
/// brackets inside JSON payloads never terminate a token early.
pub fn tokenize(text: &str) -> Vec<DecoratorToken> {
    let text = text.trim_start();
    let text = text.strip_prefix("%%").unwrap_or(text);
    let chars: Vec<char> = text.chars().collect();

    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < chars.len() {
        if chars[pos] != '@' {
            pos += 1;
            continue;
        }
        pos += 1;

        let start = pos;
        while pos < chars.len() && chars[pos].is_alphabetic() {
            pos += 1;
        }
        if pos == start {
            continue;
        }
        let name: String = chars[start..pos].iter().collect();

        while pos < chars.len() && chars[pos].is_whitespace() {
            pos += 1;
        }

        let mut field_hint = None;
        if pos < chars.len() && !matches!(chars[pos], '{' | '[' | '@') {
            let hint_start = pos;
            while pos < chars.len()
                && !chars[pos].is_whitespace()
                && !matches!(chars[pos], '@' | '{' | '[')
            {
                pos += 1;
            }
            let hint: String = chars[hint_start..pos].iter().collect();
            let hint = hint.trim_end_matches(',');
            if !hint.is_empty() {
                field_hint = Some(hint.to_string());
            }
            while pos < chars.len() && chars[pos].is_whitespace() {
                pos += 1;
            }
        }

        let mut payload = None;
        if pos < chars.len() && matches!(chars[pos], '{' | '[') {
            let (text, next) = scan_bracketed(&chars, pos);
            payload = Some(text);
            pos = next;
        }

        while pos < chars.len() && (chars[pos].is_whitespace() || chars[pos] == ',') {
            pos += 1;
        }

        tokens.push(DecoratorToken {
            name,
            payload,
            field_hint,
        });
    }
    tokens
}

/// Scan a `{...}`/`[...]` span starting at the opening bracket. Returns
/// the matched text (brackets included) and the position just past it.
/// An unterminated span runs to the end of the chunk; the bad JSON is
/// reported by whoever parses the payload.
fn scan_bracketed(chars: &[char], start: usize) -> (String, usize) {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut pos = start;
    while pos < chars.len() {
        let c = chars[pos];
        match quote {
            Some(q) => {
                if c == '\\' {
                    pos += 1;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => quote = Some(c),
                '{' | '[' => depth += 1,
                '}' | ']' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        pos += 1;
                        return (chars[start..pos].iter().collect(), pos);
                    }
                }
                _ => {}
            },
        }
        pos += 1;
    }
    (chars[start..].iter().collect(), chars.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(tokens: &[DecoratorToken]) -> Vec<&str> {
        tokens.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_single_bare_decorator() {
        let tokens = tokenize("%% @abstract");
        assert_eq!(
            tokens,
            vec![DecoratorToken {
                name: "abstract".into(),
                payload: None,
                field_hint: None,
            }]
        );
    }

    #[test]
    fn test_hint_and_payload() {
        let tokens = tokenize(r#"@include Base {"displayAfterField": "2"}"#);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].name, "include");
        assert_eq!(tokens[0].field_hint.as_deref(), Some("Base"));
        assert_eq!(
            tokens[0].payload.as_deref(),
            Some(r#"{"displayAfterField": "2"}"#)
        );
    }

    #[test]
    fn test_multiple_decorators_in_order() {
        let tokens = tokenize(r#"%% @service audit @ui {"icon": "user"} @operations cru"#);
        assert_eq!(names(&tokens), vec!["service", "ui", "operations"]);
        assert_eq!(tokens[0].field_hint.as_deref(), Some("audit"));
        assert_eq!(tokens[2].field_hint.as_deref(), Some("cru"));
    }

    #[test]
    fn test_payload_with_nested_brackets_and_commas() {
        let tokens = tokenize(r#"@ui {"a": 1, "b": [1,2,3]}"#);
        assert_eq!(tokens.len(), 1);
        let parsed: serde_json::Value =
            serde_json::from_str(tokens[0].payload.as_deref().unwrap()).unwrap();
        assert_eq!(parsed, serde_json::json!({"a": 1, "b": [1, 2, 3]}));
    }

    #[test]
    fn test_quoted_braces_do_not_close_scan() {
        let tokens = tokenize(r#"@validate {"pattern": {"regex": "^[a-z{]+\"}", "message": "bad"}} @unique"#);
        assert_eq!(names(&tokens), vec!["validate", "unique"]);
        let parsed: serde_json::Value =
            serde_json::from_str(tokens[0].payload.as_deref().unwrap()).unwrap();
        assert_eq!(parsed["pattern"]["message"], "bad");
    }

    #[test]
    fn test_array_payload() {
        let tokens = tokenize(r#"@operations ["create", "read"]"#);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].field_hint, None);
        assert_eq!(tokens[0].payload.as_deref(), Some(r#"["create", "read"]"#));
    }

    #[test]
    fn test_lone_comma_is_not_a_hint() {
        let tokens = tokenize("@unique , @abstract");
        assert_eq!(names(&tokens), vec!["unique", "abstract"]);
        assert_eq!(tokens[0].field_hint, None);
    }

    #[test]
    fn test_trailing_comma_stripped_from_hint() {
        let tokens = tokenize("@service auth, @service mail");
        assert_eq!(tokens[0].field_hint.as_deref(), Some("auth"));
        assert_eq!(tokens[1].field_hint.as_deref(), Some("mail"));
    }

    #[test]
    fn test_unterminated_payload_runs_to_end() {
        let tokens = tokenize(r#"@ui {"open": 1"#);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].payload.as_deref(), Some(r#"{"open": 1"#));
    }

    #[test]
    fn test_text_without_decorators() {
        assert!(tokenize("just a comment line").is_empty());
        assert!(tokenize("%%").is_empty());
    }
}
