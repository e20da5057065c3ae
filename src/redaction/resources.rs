//! Resource dictionaries of rewritten pages and form copies.

use crate::text::extract::{page_resources, PageScan};
use crate::text::geometry::resolve;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeSet, HashSet};

/// Owned copy of the page's resources, inherited or not.
pub(crate) fn page_copy(doc: &Document, page_id: ObjectId) -> Dictionary {
    page_resources(doc, page_id).cloned().unwrap_or_default()
}

/// Owned copy of the resources in effect for `scan.streams[index]`: the
/// form's own, or those of the stream that draws it.
pub(crate) fn effective_copy(doc: &Document, scan: &PageScan, index: usize) -> Dictionary {
    let mut current = index;
    while let Some(call) = scan.streams.get(current).and_then(|s| s.form.as_ref()) {
        let own = doc
            .get_object(call.id)
            .and_then(Object::as_stream)
            .ok()
            .and_then(|form| form.dict.get(b"Resources").ok())
            .and_then(|o| resolve(doc, o).as_dict().ok());
        if let Some(resources) = own {
            return resources.clone();
        }
        current = call.parent;
    }
    page_copy(doc, scan.id)
}

/// Adds `object` to the `category` subdictionary (`Font`, `XObject`) under
/// the first free `{prefix}{n}` name and returns that name.
pub(crate) fn add_resource(
    doc: &Document,
    resources: &mut Dictionary,
    category: &str,
    prefix: &str,
    object: ObjectId,
) -> String {
    let mut entries: Dictionary = resources
        .get(category.as_bytes())
        .ok()
        .and_then(|o| resolve(doc, o).as_dict().ok())
        .cloned()
        .unwrap_or_default();
    let name = (0..)
        .map(|n| format!("{}{}", prefix, n))
        .find(|candidate| !entries.has(candidate.as_bytes()))
        .unwrap_or_else(|| prefix.to_string());
    entries.set(name.as_bytes().to_vec(), Object::Reference(object));
    resources.set(category, Object::Dictionary(entries));
    name
}

/// Removes every `XObject` resource entry pointing at one of `forms`, so the
/// unredacted originals become unreachable and are pruned.
pub(crate) fn forget_forms(doc: &mut Document, forms: &BTreeSet<ObjectId>) -> usize {
    if forms.is_empty() {
        return 0;
    }
    let mut indirect: HashSet<ObjectId> = HashSet::new();
    for object in doc.objects.values() {
        let Some(dict) = dictionary_of(object) else { continue };
        for resources in resource_dicts(doc, dict) {
            if let Ok(Object::Reference(id)) = resources.get(b"XObject") {
                indirect.insert(*id);
            }
        }
    }

    let mut removed = 0;
    for (id, object) in doc.objects.iter_mut() {
        let dict = match object {
            Object::Dictionary(dict) => dict,
            Object::Stream(stream) => &mut stream.dict,
            _ => continue,
        };
        if indirect.contains(id) {
            removed += remove_references(dict, forms);
        }
        if let Ok(Object::Dictionary(xobjects)) = dict.get_mut(b"XObject") {
            removed += remove_references(xobjects, forms);
        }
        if let Ok(Object::Dictionary(resources)) = dict.get_mut(b"Resources") {
            if let Ok(Object::Dictionary(xobjects)) = resources.get_mut(b"XObject") {
                removed += remove_references(xobjects, forms);
            }
        }
    }
    removed
}

fn dictionary_of(object: &Object) -> Option<&Dictionary> {
    match object {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

/// `dict` itself and its `/Resources`, when that is a dictionary.
fn resource_dicts<'a>(doc: &'a Document, dict: &'a Dictionary) -> Vec<&'a Dictionary> {
    let mut found = vec![dict];
    if let Some(resources) = dict
        .get(b"Resources")
        .ok()
        .and_then(|o| resolve(doc, o).as_dict().ok())
    {
        found.push(resources);
    }
    found
}

fn remove_references(entries: &mut Dictionary, forms: &BTreeSet<ObjectId>) -> usize {
    let stale: Vec<Vec<u8>> = entries
        .iter()
        .filter(|(_, value)| matches!(value, Object::Reference(id) if forms.contains(id)))
        .map(|(name, _)| name.clone())
        .collect();
    for name in &stale {
        entries.remove(name);
    }
    stale.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    #[test]
    fn test_added_resources_get_free_names() {
        let doc = Document::with_version("1.5");
        let mut resources = dictionary! {
            "XObject" => dictionary! { "XForm0" => Object::Reference((9, 0)) },
        };
        assert_eq!(add_resource(&doc, &mut resources, "XObject", "XForm", (10, 0)), "XForm1");
        assert_eq!(add_resource(&doc, &mut resources, "Font", "XLabel", (11, 0)), "XLabel0");
        let xobjects = resources.get(b"XObject").and_then(Object::as_dict).unwrap();
        assert!(xobjects.has(b"XForm0"));
        assert!(xobjects.has(b"XForm1"));
    }

    #[test]
    fn test_forgotten_forms_are_unlinked_everywhere() {
        let mut doc = Document::with_version("1.5");
        let form = doc.add_object(Stream::new(dictionary! { "Subtype" => "Form" }, Vec::new()));
        let other = doc.add_object(Stream::new(dictionary! { "Subtype" => "Form" }, Vec::new()));
        let shared = doc.add_object(dictionary! { "Fm0" => form, "Fm1" => other });
        let pages = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Resources" => dictionary! { "XObject" => shared },
        });
        let page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages,
            "Resources" => dictionary! { "XObject" => dictionary! { "Mine" => form } },
        });

        let removed = forget_forms(&mut doc, &BTreeSet::from([form]));
        assert_eq!(removed, 2);
        let shared = doc.get_dictionary(shared).unwrap();
        assert!(!shared.has(b"Fm0"));
        assert!(shared.has(b"Fm1"));
        let own = doc
            .get_dictionary(page)
            .unwrap()
            .get(b"Resources")
            .and_then(Object::as_dict)
            .and_then(|r| r.get(b"XObject"))
            .and_then(Object::as_dict)
            .unwrap();
        assert!(!own.has(b"Mine"));
    }
}
