//! Department Name Canonicalizer
//! Maps verbose registrar department labels to short display names.

use std::collections::HashMap;

/// Registrar labels that are shortened before aggregation.
///
/// No right-hand value appears on the left, so applying the table twice is
/// the same as applying it once.
pub const DEPARTMENT_RENAMES: [(&str, &str); 12] = [
    ("African & African Amer Studies", "African Studies"),
    ("Electrical Eng & Computer Sci", "EECS"),
    ("Environmental Sci, Policy, & Mgmt", "ESPM"),
    ("Industrial Eng & Operations Res", "IEOR"),
    ("Civil & Environmental Eng", "Civil Eng"),
    ("Chemical & Biomolecular Eng", "Chemical Eng"),
    ("Materials Science & Engineering", "Materials Sci"),
    ("Mechanical Engineering", "Mechanical Eng"),
    ("Molecular & Cell Biology", "MCB"),
    ("Nutritional Science & Toxicology", "Nutritional Sci"),
    ("Gender & Women's Studies", "Gender Studies"),
    ("Political Science", "Political Sci"),
];

/// Immutable label lookup. Labels without an entry pass through unchanged.
#[derive(Debug, Clone)]
pub struct DepartmentNames {
    renames: HashMap<String, String>,
}

impl Default for DepartmentNames {
    fn default() -> Self {
        Self::new(&DEPARTMENT_RENAMES)
    }
}

impl DepartmentNames {
    pub fn new(renames: &[(&str, &str)]) -> Self {
        Self {
            renames: renames
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }

    /// Return the canonical name for a raw department label.
    pub fn canonicalize<'a>(&'a self, label: &'a str) -> &'a str {
        self.renames.get(label).map(String::as_str).unwrap_or(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_verbose_labels() {
        let names = DepartmentNames::default();
        assert_eq!(
            names.canonicalize("African & African Amer Studies"),
            "African Studies"
        );
        assert_eq!(names.canonicalize("Electrical Eng & Computer Sci"), "EECS");
    }

    #[test]
    fn unknown_labels_pass_through() {
        let names = DepartmentNames::default();
        assert_eq!(names.canonicalize("Mathematics"), "Mathematics");
        assert_eq!(names.canonicalize(""), "");
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let names = DepartmentNames::default();
        assert_eq!(names.canonicalize("political science"), "political science");
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let names = DepartmentNames::default();
        let mut labels: Vec<&str> = DEPARTMENT_RENAMES.iter().map(|(from, _)| *from).collect();
        labels.extend(DEPARTMENT_RENAMES.iter().map(|(_, to)| *to));
        labels.extend(["Economics", "History", "EECS "]);

        for label in labels {
            let once = names.canonicalize(label);
            assert_eq!(names.canonicalize(once), once, "label {label:?}");
        }
    }

    #[test]
    fn custom_table() {
        let names = DepartmentNames::new(&[("Econ Dept", "Economics")]);
        assert_eq!(names.canonicalize("Econ Dept"), "Economics");
        assert_eq!(names.canonicalize("EECS"), "EECS");
    }
}
