//! Picks ids and archive paths for the two new items so that nothing
//! already in the book is shadowed or overwritten.

use std::collections::HashSet;

use cover_core::asset::CoverFormat;
use cover_utils::archive::ArchiveEntry;
use cover_utils::path::{parent_dir, relative_href, resolve_href};

use crate::package::Package;

/// Names chosen for the cover image and its wrapper page.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CoverPlan {
    pub image_id: String,
    pub image_path: String,
    pub page_id: String,
    pub page_path: String,
}

impl CoverPlan {
    pub fn new(
        opf_path: &str,
        package: &Package,
        entries: &[ArchiveEntry],
        format: CoverFormat,
    ) -> Self {
        let dir = parent_dir(opf_path);

        let mut ids = package.ids.clone();
        let image_id = unique_id("cover-image", &ids);
        ids.insert(image_id.clone());
        let page_id = unique_id("cover-page", &ids);

        // Compared case-insensitively: the book may be unpacked onto a
        // case-insensitive filesystem.
        let mut taken: HashSet<String> = entries.iter().map(|e| e.name.to_lowercase()).collect();
        taken.extend(
            package
                .items
                .iter()
                .map(|i| resolve_href(dir, &i.href).to_lowercase()),
        );
        let image_path = unique_path(dir, "cover", format.extension(), &taken);
        taken.insert(image_path.to_lowercase());
        let page_path = unique_path(dir, "cover", "xhtml", &taken);

        Self {
            image_id,
            image_path,
            page_id,
            page_path,
        }
    }

    /// Href of the cover page as seen from the document at `doc_path`.
    pub fn page_href_from(&self, doc_path: &str) -> String {
        relative_href(doc_path, &self.page_path)
    }

    pub fn image_href_from(&self, doc_path: &str) -> String {
        relative_href(doc_path, &self.image_path)
    }
}

fn unique_id(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

fn unique_path(dir: &str, stem: &str, ext: &str, taken: &HashSet<String>) -> String {
    let first = format!("{}{}.{}", dir, stem, ext);
    if !taken.contains(&first.to_lowercase()) {
        return first;
    }
    (1..)
        .map(|n| format!("{}{}_{}.{}", dir, stem, n, ext))
        .find(|candidate| !taken.contains(&candidate.to_lowercase()))
        .unwrap_or(first)
}
