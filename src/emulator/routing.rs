//! Path templates such as `/compute/v1/projects/{project}/zones/{zone}/instances`

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// Parsed REST path template
#[derive(Debug, Clone, PartialEq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Self {
        let segments = split(template)
            .map(|s| {
                if s.len() > 2 && s.starts_with('{') && s.ends_with('}') {
                    Segment::Param(s[1..s.len() - 1].to_string())
                } else {
                    Segment::Literal(s.to_string())
                }
            })
            .collect();
        Self { segments }
    }

    /// Path parameters when `path` matches this template segment for segment.
    /// Parameter values are percent-decoded.
    ///
    /// ```
    /// use mockcloud::emulator::PathTemplate;
    ///
    /// let template = PathTemplate::parse("/compute/v1/projects/{project}/zones/{zone}/instances");
    /// let params = template.matches("/compute/v1/projects/prfoo/zones/zbar/instances").unwrap();
    /// assert_eq!(params["project"], "prfoo");
    /// assert_eq!(params["zone"], "zbar");
    /// ```
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = split(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {},
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    let value = urlencoding::decode(part).ok()?.into_owned();
                    if value.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), value);
                },
            }
        }
        Some(params)
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
