use crate::domain::{AccessionKey, LookupOutcome, Record};

pub fn classify(key: &AccessionKey, outcome: LookupOutcome) -> Record {
    match outcome {
        LookupOutcome::Resolved {
            external_id,
            display_name,
        } => Record {
            key: key.clone(),
            external_id: Some(external_id),
            display_name: Some(display_name),
        },
        LookupOutcome::Miss => Record {
            key: key.clone(),
            external_id: None,
            display_name: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DisplayName;

    #[test]
    fn resolved_is_complete() {
        let key: AccessionKey = "ABC123.1".parse().unwrap();
        let record = classify(
            &key,
            LookupOutcome::Resolved {
                external_id: "P1".to_string(),
                display_name: DisplayName::Named("geneA".to_string()),
            },
        );
        assert!(record.is_complete());
        assert_eq!(record.key, key);
    }

    #[test]
    fn miss_is_incomplete() {
        let key: AccessionKey = "ABC123.1".parse().unwrap();
        let record = classify(&key, LookupOutcome::Miss);
        assert!(!record.is_complete());
        assert_eq!(record.external_id, None);
        assert_eq!(record.display_name, None);
    }
}
