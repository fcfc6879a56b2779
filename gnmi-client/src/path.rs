//! gNMI path handling

use std::collections::HashMap;

use crate::gnmi::{Path, PathElem};

/// Splits a slash-separated path into its raw segments.
///
/// Segments are opaque: bracketed key expressions such as
/// `interface[name=eth0]` are not parsed and remain part of the segment.
/// Leading, trailing and repeated slashes yield no segments, so both the
/// empty string and `/` produce an empty vector.
pub fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses an XPath-like string into a gNMI Path.
///
/// e.g., "/interfaces/interface[name=eth0]/state/counters"
pub fn parse_xpath(path_str: &str) -> Path {
    let mut elems = Vec::new();

    for segment in path_str.split('/').filter(|s| !s.is_empty()) {
        let (name, key) = parse_segment(segment);
        elems.push(PathElem { name, key });
    }

    Path {
        elem: elems,
        ..Default::default()
    }
}

/// Parses "interface[name=eth0]" into ("interface", {"name": "eth0"})
fn parse_segment(segment: &str) -> (String, HashMap<String, String>) {
    if let Some((name, rest)) = segment.split_once('[') {
        let keys_str = rest.strip_suffix(']').unwrap_or(rest);
        let mut keys = HashMap::new();

        for key_val in keys_str.split(',') {
            if let Some((k, v)) = key_val.split_once('=') {
                keys.insert(k.trim().to_string(), v.trim().to_string());
            }
        }

        (name.to_string(), keys)
    } else {
        (segment.to_string(), HashMap::new())
    }
}

/// Renders a gNMI Path back into XPath-like form. Keys are sorted so that
/// elements with several keys render the same way on every run.
pub fn to_xpath(path: &Path) -> String {
    path.elem
        .iter()
        .map(|elem| {
            if elem.key.is_empty() {
                elem.name.clone()
            } else {
                let mut keys: Vec<String> = elem
                    .key
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect();
                keys.sort();
                format!("{}[{}]", elem.name, keys.join(","))
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path_simple() {
        let segments = split_path("/interfaces/interface/state");
        assert_eq!(segments, vec!["interfaces", "interface", "state"]);
    }

    #[test]
    fn test_split_path_keeps_brackets_opaque() {
        let segments = split_path("/interfaces/interface[name=eth0]");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], "interfaces");
        assert_eq!(segments[1], "interface[name=eth0]");
    }

    #[test]
    fn test_split_path_empty_and_stray_slashes() {
        assert!(split_path("").is_empty());
        assert!(split_path("/").is_empty());
        assert_eq!(split_path("a//b/"), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_xpath_simple() {
        let path = parse_xpath("/interfaces/interface/state");
        assert_eq!(path.elem.len(), 3);
        assert_eq!(path.elem[0].name, "interfaces");
        assert_eq!(path.elem[1].name, "interface");
        assert_eq!(path.elem[2].name, "state");
        assert!(path.elem.iter().all(|e| e.key.is_empty()));
    }

    #[test]
    fn test_parse_xpath_with_keys() {
        let path = parse_xpath("/interfaces/interface[name=eth0]/state");
        assert_eq!(path.elem.len(), 3);
        assert_eq!(path.elem[1].name, "interface");
        assert_eq!(path.elem[1].key.get("name"), Some(&"eth0".to_string()));
    }

    #[test]
    fn test_parse_xpath_multiple_keys() {
        let path = parse_xpath("/network-instances/network-instance[name=default,type=L3VRF]");
        assert_eq!(path.elem.len(), 2);
        let keys = &path.elem[1].key;
        assert_eq!(keys.len(), 2);
        assert_eq!(keys.get("name"), Some(&"default".to_string()));
        assert_eq!(keys.get("type"), Some(&"L3VRF".to_string()));
    }

    #[test]
    fn test_parse_segment_unclosed_bracket() {
        let (name, keys) = parse_segment("interface[name=eth0");
        assert_eq!(name, "interface");
        assert_eq!(keys.get("name"), Some(&"eth0".to_string()));
    }

    #[test]
    fn test_to_xpath() {
        let mut path = Path::default();
        path.elem.push(PathElem {
            name: "interfaces".to_string(),
            key: HashMap::new(),
        });
        path.elem.push(PathElem {
            name: "interface".to_string(),
            key: [("name".to_string(), "eth0".to_string())]
                .into_iter()
                .collect(),
        });

        assert_eq!(to_xpath(&path), "interfaces/interface[name=eth0]");
    }

    #[test]
    fn test_to_xpath_sorts_keys() {
        let path = Path {
            elem: vec![PathElem {
                name: "neighbor".to_string(),
                key: [
                    ("port".to_string(), "179".to_string()),
                    ("address".to_string(), "10.0.0.1".to_string()),
                ]
                .into_iter()
                .collect(),
            }],
            ..Default::default()
        };

        assert_eq!(to_xpath(&path), "neighbor[address=10.0.0.1,port=179]");
    }
}
