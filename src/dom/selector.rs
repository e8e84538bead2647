use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unsupported selector syntax in '{0}'")]
    Unsupported(String),
}

/// One compound selector: optional type plus zero or more classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compound {
    pub tag: Option<String>,
    pub classes: Vec<String>,
}

/// A descendant-combinator chain such as `h3 a` or `div.result-item`.
///
/// Only type and class selectors are supported, which covers the fixed
/// selectors the host pages use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub(crate) parts: Vec<Compound>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let parts = input
            .split_whitespace()
            .map(|part| parse_compound(part).ok_or_else(|| SelectorError::Unsupported(input.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        if parts.is_empty() {
            return Err(SelectorError::Empty);
        }
        Ok(Self { parts })
    }

    /// The single class name this selector targets, when it is just `.name`.
    pub fn class_name(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [Compound { tag: None, classes }] if classes.len() == 1 => Some(classes[0].as_str()),
            _ => None,
        }
    }
}

impl std::str::FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn parse_compound(part: &str) -> Option<Compound> {
    let mut pieces = part.split('.');
    let head = pieces.next()?;
    let tag = match head {
        "" | "*" => None,
        t if t.chars().all(is_ident_char) => Some(t.to_ascii_lowercase()),
        _ => return None,
    };
    let classes = pieces
        .map(|c| (!c.is_empty() && c.chars().all(is_ident_char)).then(|| c.to_string()))
        .collect::<Option<Vec<_>>>()?;
    if tag.is_none() && classes.is_empty() && head != "*" {
        return None;
    }
    Some(Compound { tag, classes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_class() {
        let sel = Selector::parse(".result-item").unwrap();
        assert_eq!(sel.class_name(), Some("result-item"));
    }

    #[test]
    fn test_parse_descendant() {
        let sel = Selector::parse("h3  a").unwrap();
        assert_eq!(sel.parts.len(), 2);
        assert_eq!(sel.parts[0].tag.as_deref(), Some("h3"));
        assert_eq!(sel.parts[1].tag.as_deref(), Some("a"));
        assert_eq!(sel.class_name(), None);
    }

    #[test]
    fn test_parse_compound() {
        let sel = Selector::parse("DIV.a.b").unwrap();
        assert_eq!(
            sel.parts[0],
            Compound {
                tag: Some("div".into()),
                classes: vec!["a".into(), "b".into()]
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Selector::parse("  "), Err(SelectorError::Empty));
        assert!(Selector::parse("a > b").is_err());
        assert!(Selector::parse("a[href]").is_err());
        assert!(Selector::parse("a..b").is_err());
    }
}
