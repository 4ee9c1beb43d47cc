use std::collections::{BTreeMap, BTreeSet};

use joebot_models::{FilterField, JobRecord};

/// Fields whose distinct values are collected.
pub const VOCABULARY_FIELDS: [FilterField; 6] = [
    FilterField::Institution,
    FilterField::Country,
    FilterField::State,
    FilterField::Section,
    FilterField::Department,
    FilterField::Field,
];

/// Distinct known values per text field, computed once at load time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    values: BTreeMap<FilterField, BTreeSet<String>>,
}

impl Vocabulary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a JobRecord>) -> Self {
        let mut values: BTreeMap<FilterField, BTreeSet<String>> = BTreeMap::new();
        for record in records {
            for field in VOCABULARY_FIELDS {
                let set = values.entry(field).or_default();
                if field == FilterField::Field {
                    set.extend(record.field_codes().map(str::to_string));
                } else if let Some(value) = record.text(field) {
                    set.insert(value.to_string());
                }
            }
        }
        Self { values }
    }

    /// Build directly from value lists. Used by tests and the matcher.
    pub fn from_values<I, S>(entries: impl IntoIterator<Item = (FilterField, I)>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values: BTreeMap<FilterField, BTreeSet<String>> = BTreeMap::new();
        for (field, items) in entries {
            values
                .entry(field)
                .or_default()
                .extend(items.into_iter().map(Into::into));
        }
        Self { values }
    }

    /// Sorted distinct values of `field`.
    pub fn values(&self, field: FilterField) -> impl Iterator<Item = &str> {
        self.values
            .get(&field)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn len(&self, field: FilterField) -> usize {
        self.values.get(&field).map_or(0, BTreeSet::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_distinct_sorted_values() {
        let records = vec![
            JobRecord {
                institution: Some("MIT".to_string()),
                state: Some("Massachusetts".to_string()),
                field: Some("C1 Econometrics\nJ2 Labor".to_string()),
                ..Default::default()
            },
            JobRecord {
                institution: Some("Harvard University".to_string()),
                state: Some("Massachusetts".to_string()),
                ..Default::default()
            },
            JobRecord {
                institution: Some("  ".to_string()),
                ..Default::default()
            },
        ];
        let vocab = Vocabulary::from_records(&records);
        let institutions: Vec<&str> = vocab.values(FilterField::Institution).collect();
        assert_eq!(institutions, vec!["Harvard University", "MIT"]);
        assert_eq!(vocab.len(FilterField::State), 1);
        assert_eq!(vocab.len(FilterField::Field), 2);
        assert_eq!(vocab.len(FilterField::Country), 0);
    }

    #[test]
    fn unknown_field_is_empty() {
        let vocab = Vocabulary::from_values([(FilterField::Country, ["Canada"])]);
        assert_eq!(vocab.values(FilterField::Keywords).count(), 0);
        assert_eq!(vocab.values(FilterField::Country).collect::<Vec<_>>(), vec!["Canada"]);
    }
}
