use kira_acc_resolver::config::ServiceConfig;
use kira_acc_resolver::domain::{AccessionKey, DisplayName, LookupOutcome};
use kira_acc_resolver::uniprot::{LookupClient, UniprotHttpClient, parse_tab_response};

#[test]
fn parses_first_data_row_only() {
    let body = "Entry\tGene names\nQ8N158\tGPC2\nP35052\tGPC1\n";
    assert_eq!(
        parse_tab_response(body),
        LookupOutcome::Resolved {
            external_id: "Q8N158".to_string(),
            display_name: DisplayName::Named("GPC2".to_string()),
        }
    );
}

#[test]
fn tolerates_crlf_bodies() {
    let body = "Entry\tGene names\r\nP69905\tHBA1 HBA2\r\n";
    assert_eq!(
        parse_tab_response(body),
        LookupOutcome::Resolved {
            external_id: "P69905".to_string(),
            display_name: DisplayName::Named("HBA1".to_string()),
        }
    );
}

#[test]
fn unreachable_service_is_a_miss() {
    let service = ServiceConfig {
        base_url: "http://127.0.0.1:9/uniprot/".to_string(),
        timeout_secs: 2,
        ..ServiceConfig::default()
    };
    let client = UniprotHttpClient::new(service).unwrap();
    let key: AccessionKey = "XP_011519453.1".parse().unwrap();
    assert_eq!(client.lookup(&key), LookupOutcome::Miss);
}
