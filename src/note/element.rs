//! Provenance of the page element a note was created over.

/// Snapshot of a DOM element and its ancestors, as handed over by the
/// rendering layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementInfo {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub parent: Option<Box<ElementInfo>>,
}

impl ElementInfo {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classes = classes.into_iter().map(Into::into).collect();
        self
    }

    pub fn within(mut self, parent: ElementInfo) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    fn selector(&self) -> Result<String, String> {
        if self.tag.trim().is_empty() {
            return Err("element without a tag name".to_string());
        }
        let mut selector = self.tag.to_lowercase();
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => {
                selector.push('#');
                selector.push_str(id);
            }
            _ => {
                let classes: Vec<&str> = self
                    .classes
                    .iter()
                    .map(String::as_str)
                    .filter(|c| !c.is_empty())
                    .collect();
                if !classes.is_empty() {
                    selector.push('.');
                    selector.push_str(&classes.join("."));
                }
            }
        }
        Ok(selector)
    }
}

/// Selector path from just below the document root down to `element`,
/// e.g. `body > div#main > p.intro.lead`.
///
/// Best effort: any failure is logged and yields `None`.
pub fn element_path(element: &ElementInfo) -> Option<String> {
    let mut segments = Vec::new();
    let mut current = Some(element);

    while let Some(node) = current {
        // the root element itself is not part of the path
        let Some(parent) = node.parent.as_deref() else {
            break;
        };
        match node.selector() {
            Ok(selector) => segments.push(selector),
            Err(e) => {
                tracing::warn!("Error getting element path: {}", e);
                return None;
            }
        }
        current = Some(parent);
    }

    segments.reverse();
    Some(segments.join(" > "))
}
