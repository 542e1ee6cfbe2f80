use std::fmt;
use std::time::Duration;

/// Outcome of one timed query against one store.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Wall time of the query, fetching every result included.
    pub elapsed: Duration,
    /// Number of rows or documents the query returned.
    pub rows: u64,
    /// Plan summary, when the store could explain the query.
    pub explain: Option<String>,
}

impl Measurement {
    pub fn millis(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// Store that answered a query faster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Store {
    Document,
    Relational,
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Store::Document => f.write_str("mongodb"),
            Store::Relational => f.write_str("postgres"),
        }
    }
}

/// The same query timed against both stores.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub name: &'static str,
    pub document: Measurement,
    pub relational: Measurement,
}

impl Comparison {
    /// Document store time divided by relational store time, or zero when the relational
    /// store took no measurable time.
    pub fn ratio(&self) -> f64 {
        let relational = self.relational.millis();
        if relational > 0.0 {
            self.document.millis() / relational
        } else {
            0.0
        }
    }

    /// The relational store wins only when strictly faster.
    pub fn winner(&self) -> Store {
        if self.relational.elapsed < self.document.elapsed {
            Store::Relational
        } else {
            Store::Document
        }
    }
}

/// Size figures of the document store collection.
#[derive(Debug, Clone)]
pub struct DocumentStats {
    pub collection: String,
    pub document_count: u64,
    /// Average document size in bytes.
    pub avg_object_size: f64,
    /// Storage size in bytes.
    pub storage_size: f64,
}

/// Size figures of the relational store table.
#[derive(Debug, Clone)]
pub struct RelationalStats {
    pub table: String,
    pub row_count: i64,
    /// Total relation size as pretty-printed by the server, e.g. `48 kB`.
    pub total_size: String,
}

/// Indexes present on both stores and a filtered count timed with them.
#[derive(Debug, Clone)]
pub struct IndexImpact {
    pub document_indexes: Vec<String>,
    pub relational_indexes: Vec<String>,
    pub document: Measurement,
    pub relational: Measurement,
}

pub fn render_stats(document: &DocumentStats, relational: &RelationalStats) -> String {
    let mut out = String::new();
    out.push_str("mongodb\n");
    out.push_str(&format!("  collection: {}\n", document.collection));
    out.push_str(&format!("  documents: {}\n", document.document_count));
    out.push_str(&format!(
        "  average document size: {:.0} bytes\n",
        document.avg_object_size
    ));
    out.push_str(&format!(
        "  storage size: {:.2} MB\n",
        document.storage_size / 1024.0 / 1024.0
    ));
    out.push_str("postgres\n");
    out.push_str(&format!("  table: {}\n", relational.table));
    out.push_str(&format!("  rows: {}\n", relational.row_count));
    out.push_str(&format!("  total size: {}\n", relational.total_size));

    out
}

pub fn render_index_impact(impact: &IndexImpact) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "mongodb indexes: {}\n",
        impact.document_indexes.join(", ")
    ));
    out.push_str(&format!(
        "  count: {:.2} ms ({} documents)\n",
        impact.document.millis(),
        impact.document.rows
    ));
    out.push_str(&format!(
        "postgres indexes: {}\n",
        impact.relational_indexes.join(", ")
    ));
    out.push_str(&format!(
        "  count: {:.2} ms ({} rows)\n",
        impact.relational.millis(),
        impact.relational.rows
    ));

    out
}

/// Renders the comparison table, one line per test.
pub fn render_summary(comparisons: &[Comparison]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<24}{:>14}{:>15}{:>9}  {}\n",
        "test", "mongodb (ms)", "postgres (ms)", "ratio", "winner"
    ));

    for comparison in comparisons {
        out.push_str(&format!(
            "{:<24}{:>14.2}{:>15.2}{:>9}  {}\n",
            comparison.name,
            comparison.document.millis(),
            comparison.relational.millis(),
            format!("{:.2}x", comparison.ratio()),
            comparison.winner()
        ));
    }

    out.push_str("ratio > 1: mongodb slower, ratio < 1: postgres slower\n");

    out
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;

    fn measured(micros: u64) -> Measurement {
        Measurement {
            elapsed: Duration::from_micros(micros),
            rows: 0,
            explain: None,
        }
    }

    fn comparison(name: &'static str, document_micros: u64, relational_micros: u64) -> Comparison {
        Comparison {
            name,
            document: measured(document_micros),
            relational: measured(relational_micros),
        }
    }

    #[test]
    fn ratio_is_zero_when_relational_time_is_zero() {
        let comparison = comparison("aggregation", 1_000, 0);

        assert_eq!(comparison.ratio(), 0.0);
        assert_eq!(comparison.winner(), Store::Relational);
    }

    #[test]
    fn ties_go_to_the_document_store() {
        let comparison = comparison("simple select", 2_000, 2_000);

        assert_eq!(comparison.ratio(), 1.0);
        assert_eq!(comparison.winner(), Store::Document);
    }

    #[test]
    fn summary_table() {
        let summary = render_summary(&[
            comparison("simple select", 12_500, 5_000),
            comparison("filtered select", 3_000, 4_500),
            comparison("aggregation", 1_000, 0),
        ]);

        assert_snapshot!(summary, @r"
        test                      mongodb (ms)  postgres (ms)    ratio  winner
        simple select                    12.50           5.00    2.50x  postgres
        filtered select                   3.00           4.50    0.67x  mongodb
        aggregation                       1.00           0.00    0.00x  postgres
        ratio > 1: mongodb slower, ratio < 1: postgres slower
        ");
    }

    #[test]
    fn stats_show_the_storage_size_in_megabytes() {
        let rendered = render_stats(
            &DocumentStats {
                collection: "ISS_loc".to_owned(),
                document_count: 200,
                avg_object_size: 112.0,
                storage_size: 3.0 * 1024.0 * 1024.0,
            },
            &RelationalStats {
                table: "iss_data".to_owned(),
                row_count: 200,
                total_size: "56 kB".to_owned(),
            },
        );

        assert!(rendered.contains("  storage size: 3.00 MB\n"));
        assert!(rendered.contains("  total size: 56 kB\n"));
    }
}
