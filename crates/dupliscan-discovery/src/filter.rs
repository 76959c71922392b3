use std::collections::HashSet;

use dupliscan_core::ScanConfig;

/// Precomputed filter predicates derived once from a [`ScanConfig`] and
/// reused by every discovery worker without re-deriving them per entry.
pub struct DiscoveryFilter {
    pub include_hidden: bool,
    pub follow_symlinks: bool,
    pub min_size_bytes: u64,
    pub max_file_size_bytes: u64,
    pub allowed_extensions: Option<Vec<String>>,
    pub exclude_dirs: HashSet<String>,
}

impl DiscoveryFilter {
    pub fn from_config(config: &ScanConfig) -> Self {
        DiscoveryFilter {
            include_hidden: config.include_hidden,
            follow_symlinks: config.follow_symlinks,
            min_size_bytes: config.min_size_bytes,
            max_file_size_bytes: config.max_file_size_bytes,
            allowed_extensions: config.effective_allowed_extensions(),
            exclude_dirs: config.exclude_dirs.clone(),
        }
    }

    pub fn is_hidden_name(&self, name: &str) -> bool {
        !self.include_hidden && name.starts_with('.')
    }

    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.exclude_dirs.iter().any(|skip| name.eq_ignore_ascii_case(skip))
    }

    pub fn passes_extension(&self, name: &str) -> bool {
        match &self.allowed_extensions {
            None => true,
            Some(exts) => {
                let lower = name.to_lowercase();
                exts.iter().any(|e| lower.ends_with(e.as_str()))
            }
        }
    }

    pub fn passes_size(&self, size: u64) -> bool {
        if size < self.min_size_bytes {
            return false;
        }
        if self.max_file_size_bytes > 0 && size > self.max_file_size_bytes {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> DiscoveryFilter {
        DiscoveryFilter::from_config(&ScanConfig {
            min_size_bytes: 1024,
            ..ScanConfig::default()
        })
    }

    #[test]
    fn hidden_names_are_excluded_by_default() {
        assert!(filter().is_hidden_name(".git"));
        assert!(!filter().is_hidden_name("visible.txt"));
    }

    #[test]
    fn size_filter_respects_min_and_max() {
        let f = DiscoveryFilter::from_config(&ScanConfig {
            min_size_bytes: 10,
            max_file_size_bytes: 100,
            ..ScanConfig::default()
        });
        assert!(!f.passes_size(5));
        assert!(f.passes_size(50));
        assert!(!f.passes_size(200));
    }

    #[test]
    fn extension_filter_is_case_insensitive() {
        let f = DiscoveryFilter::from_config(&ScanConfig {
            allowed_extensions: Some(vec![".jpg".to_string()]),
            ..ScanConfig::default()
        });
        assert!(f.passes_extension("PHOTO.JPG"));
        assert!(!f.passes_extension("readme.txt"));
    }
}
