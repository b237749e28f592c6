//! Serde model for EDGAR's submissions JSON.
//!
//! The feed is columnar: parallel arrays of accession numbers, filing dates,
//! forms and primary document names. The primary page lists an entity's most
//! recent filings plus the names of overflow pages holding the rest; each
//! overflow page is a bare [`FilingPage`].

use chrono::NaiveDate;
use serde::Deserialize;
use tally_core::fetch::FilingEntry;

#[derive(Debug, Deserialize)]
pub struct Submissions {
  pub filings: Filings,
}

#[derive(Debug, Deserialize)]
pub struct Filings {
  pub recent: FilingPage,
  #[serde(default)]
  pub files:  Vec<OverflowFile>,
}

#[derive(Debug, Deserialize)]
pub struct OverflowFile {
  pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilingPage {
  pub accession_number: Vec<String>,
  pub filing_date:      Vec<String>,
  pub form:             Vec<String>,
  pub primary_document: Vec<String>,
}

impl FilingPage {
  /// Zip the columnar arrays into entries. Rows with an unparseable date
  /// are dropped with a warning rather than failing the whole page.
  pub fn entries(&self) -> Vec<FilingEntry> {
    let len = self
      .accession_number
      .len()
      .min(self.filing_date.len())
      .min(self.form.len())
      .min(self.primary_document.len());

    (0..len)
      .filter_map(|i| {
        let filing_date =
          match NaiveDate::parse_from_str(&self.filing_date[i], "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) => {
              tracing::warn!(
                accession = self.accession_number[i],
                filing_date = self.filing_date[i],
                "dropping filing row with unparseable date"
              );
              return None;
            }
          };

        Some(FilingEntry {
          form: self.form[i].clone(),
          filing_date,
          accession: self.accession_number[i].clone(),
          primary_document: self.primary_document[i].clone(),
        })
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_and_zips_the_columnar_feed() {
    let json = r#"{
      "filings": {
        "recent": {
          "accessionNumber": ["0001193125-20-215604", "0001193125-20-219612"],
          "filingDate": ["2020-08-11", "2020-08-14"],
          "form": ["8-K", "10-Q"],
          "primaryDocument": ["d86156d8k.htm", "d946697d10q.htm"]
        },
        "files": [{ "name": "CIK0001050446-submissions-001.json" }]
      }
    }"#;

    let subs: Submissions = serde_json::from_str(json).unwrap();
    let entries = subs.filings.recent.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].accession, "0001193125-20-215604");
    assert_eq!(entries[1].form, "10-Q");
    assert_eq!(subs.filings.files.len(), 1);
  }

  #[test]
  fn overflow_page_is_a_bare_filing_page() {
    let json = r#"{
      "accessionNumber": ["0001193125-19-100001"],
      "filingDate": ["2019-04-30"],
      "form": ["10-Q"],
      "primaryDocument": ["d10q.htm"]
    }"#;

    let page: FilingPage = serde_json::from_str(json).unwrap();
    assert_eq!(page.entries().len(), 1);
  }

  #[test]
  fn bad_date_rows_are_dropped() {
    let page = FilingPage {
      accession_number: vec!["a".into(), "b".into()],
      filing_date:      vec!["2020-08-11".into(), "not a date".into()],
      form:             vec!["8-K".into(), "8-K".into()],
      primary_document: vec!["x.htm".into(), "y.htm".into()],
    };
    assert_eq!(page.entries().len(), 1);
  }

  #[test]
  fn ragged_columns_truncate_to_shortest() {
    let page = FilingPage {
      accession_number: vec!["a".into(), "b".into()],
      filing_date:      vec!["2020-08-11".into()],
      form:             vec!["8-K".into(), "8-K".into()],
      primary_document: vec!["x.htm".into(), "y.htm".into()],
    };
    assert_eq!(page.entries().len(), 1);
  }
}
