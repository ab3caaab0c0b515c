//! Small markup reader for building [`MemoryDocument`] trees in tests.
//!
//! Supports elements, double/single quoted, unquoted and valueless
//! attributes, self-closing and void elements, text and comments. Unquoted
//! values keep `->`, so `data-action=click->save` reads as expected.

use sprig_core::{DomError, Host, MemoryDocument, NodeId};
use thiserror::Error;

const VOID_ELEMENTS: &[&str] = &[
    "area", "br", "col", "hr", "img", "input", "link", "meta", "source", "wbr",
];

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MarkupError {
    #[error("unexpected end of markup at byte {0}")]
    UnexpectedEof(usize),
    #[error("expected a name at byte {0}")]
    ExpectedName(usize),
    #[error("expected `{expected}` at byte {at}")]
    Expected { expected: char, at: usize },
    #[error("`</{found}>` at byte {at} does not close `<{expected}>`")]
    MismatchedClose {
        expected: String,
        found: String,
        at: usize,
    },
    #[error("`</{found}>` at byte {at} closes nothing")]
    UnexpectedClose { found: String, at: usize },
    #[error("`<{0}>` is never closed")]
    Unclosed(String),
    #[error(transparent)]
    Dom(#[from] DomError),
}

/// Builds the elements of `markup` in `doc` and returns the top-level ones,
/// detached and in source order.
pub fn parse_fragment(doc: &MemoryDocument, markup: &str) -> Result<Vec<NodeId>, MarkupError> {
    Reader {
        doc,
        src: markup,
        pos: 0,
    }
    .fragment()
}

struct Reader<'a> {
    doc: &'a MemoryDocument,
    src: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, prefix: &str) -> bool {
        if self.rest().starts_with(prefix) {
            self.pos += prefix.len();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn take_while(&mut self, mut keep: impl FnMut(char) -> bool) -> &'a str {
        let src = self.src;
        let start = self.pos;
        while self.peek().is_some_and(&mut keep) {
            self.bump();
        }
        &src[start..self.pos]
    }

    fn fragment(mut self) -> Result<Vec<NodeId>, MarkupError> {
        let mut roots = Vec::new();
        let mut open: Vec<(String, NodeId)> = Vec::new();
        while self.pos < self.src.len() {
            if self.eat("<!--") {
                let end = self
                    .rest()
                    .find("-->")
                    .ok_or(MarkupError::UnexpectedEof(self.src.len()))?;
                self.pos += end + "-->".len();
            } else if self.eat("</") {
                let at = self.pos;
                let found = self.name()?;
                self.skip_whitespace();
                self.expect('>')?;
                match open.pop() {
                    Some((tag, _)) if tag == found => {}
                    Some((expected, _)) => {
                        return Err(MarkupError::MismatchedClose {
                            expected,
                            found,
                            at,
                        })
                    }
                    None => return Err(MarkupError::UnexpectedClose { found, at }),
                }
            } else if self.eat("<") {
                let (tag, node, self_closing) = self.open_tag()?;
                match open.last() {
                    Some(&(_, parent)) => self.doc.append_child(parent, node)?,
                    None => roots.push(node),
                }
                if !self_closing && !VOID_ELEMENTS.contains(&tag.as_str()) {
                    open.push((tag, node));
                }
            } else {
                let text = self.take_while(|c| c != '<').trim();
                if let (false, Some(&(_, parent))) = (text.is_empty(), open.last()) {
                    let mut combined = self.doc.text(parent);
                    if !combined.is_empty() {
                        combined.push(' ');
                    }
                    combined.push_str(text);
                    self.doc.set_text(parent, &combined);
                }
            }
        }
        match open.pop() {
            Some((tag, _)) => Err(MarkupError::Unclosed(tag)),
            None => Ok(roots),
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), MarkupError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            Some(_) => Err(MarkupError::Expected {
                expected,
                at: self.pos,
            }),
            None => Err(MarkupError::UnexpectedEof(self.pos)),
        }
    }

    fn name(&mut self) -> Result<String, MarkupError> {
        let at = self.pos;
        let name =
            self.take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'));
        if name.is_empty() {
            return Err(MarkupError::ExpectedName(at));
        }
        Ok(name.to_ascii_lowercase())
    }

    /// Reads the rest of an opening tag; the `<` is already consumed.
    fn open_tag(&mut self) -> Result<(String, NodeId, bool), MarkupError> {
        let tag = self.name()?;
        let node = self.doc.create_element(&tag);
        loop {
            self.skip_whitespace();
            if self.eat("/>") {
                return Ok((tag, node, true));
            }
            if self.eat(">") {
                return Ok((tag, node, false));
            }
            if self.peek().is_none() {
                return Err(MarkupError::UnexpectedEof(self.pos));
            }
            let at = self.pos;
            let name = self.take_while(|c| {
                !c.is_whitespace() && !matches!(c, '=' | '>' | '/' | '<' | '"' | '\'')
            });
            if name.is_empty() {
                return Err(MarkupError::ExpectedName(at));
            }
            self.skip_whitespace();
            let value = if self.eat("=") {
                self.skip_whitespace();
                self.attribute_value()?
            } else {
                String::new()
            };
            self.doc.set_attribute(node, name, &value);
        }
    }

    fn attribute_value(&mut self) -> Result<String, MarkupError> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let value = self.take_while(|c| c != quote);
                self.expect(quote)?;
                Ok(value.to_string())
            }
            Some(_) => {
                let mut previous = None;
                let value = self.take_while(|c| {
                    let keep = !c.is_whitespace() && (c != '>' || previous == Some('-'));
                    previous = Some(c);
                    keep
                });
                Ok(value.to_string())
            }
            None => Err(MarkupError::UnexpectedEof(self.pos)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprig_core::Runtime;

    fn document() -> (Runtime, std::rc::Rc<MemoryDocument>) {
        let runtime = Runtime::default();
        let doc = MemoryDocument::new(runtime.handle());
        (runtime, doc)
    }

    #[test]
    fn builds_nested_elements_with_attributes_and_text() {
        let (_runtime, doc) = document();
        let roots = parse_fragment(
            &doc,
            r#"
            <div data-scope="counter" data-count='3' hidden>
              <!-- the label -->
              <span data-target=output>Count</span>
              <button data-action=click->increment>+</button>
            </div>
            <p>after</p>
            "#,
        )
        .unwrap();

        assert_eq!(roots.len(), 2);
        let root = roots[0];
        assert_eq!(doc.tag(root).as_deref(), Some("div"));
        assert_eq!(doc.attribute(root, "data-scope").as_deref(), Some("counter"));
        assert_eq!(doc.attribute(root, "data-count").as_deref(), Some("3"));
        assert_eq!(doc.attribute(root, "hidden").as_deref(), Some(""));

        let children = doc.children(root);
        assert_eq!(children.len(), 2);
        assert_eq!(doc.text(children[0]), "Count");
        assert_eq!(
            doc.attribute(children[1], "data-action").as_deref(),
            Some("click->increment")
        );
        assert_eq!(doc.text(children[1]), "+");
        assert_eq!(doc.text(roots[1]), "after");
        assert!(!doc.is_connected(root));
    }

    #[test]
    fn void_and_self_closing_elements_take_no_children() {
        let (_runtime, doc) = document();
        let roots = parse_fragment(&doc, "<form><input name=q><br/><em /></form>").unwrap();
        let children = doc.children(roots[0]);
        let tags: Vec<_> = children.iter().filter_map(|&c| doc.tag(c)).collect();
        assert_eq!(tags, vec!["input", "br", "em"]);
        assert!(children.iter().all(|&c| doc.children(c).is_empty()));
    }

    #[test]
    fn reports_structural_errors() {
        let (_runtime, doc) = document();
        assert!(matches!(
            parse_fragment(&doc, "<div><span></div>"),
            Err(MarkupError::MismatchedClose { ref expected, ref found, .. })
                if expected == "span" && found == "div"
        ));
        assert!(matches!(
            parse_fragment(&doc, "</div>"),
            Err(MarkupError::UnexpectedClose { .. })
        ));
        assert_eq!(
            parse_fragment(&doc, "<section><p>"),
            Err(MarkupError::Unclosed("p".into()))
        );
        assert!(matches!(
            parse_fragment(&doc, "<div title=\"open"),
            Err(MarkupError::UnexpectedEof(_))
        ));
        assert_eq!(parse_fragment(&doc, "< div>"), Err(MarkupError::ExpectedName(1)));
    }
}
