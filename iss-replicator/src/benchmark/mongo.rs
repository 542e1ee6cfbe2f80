use std::time::Instant;

use futures::TryStreamExt;
use iss::error::IssResult;
use iss::source::mongo::MongoSource;
use mongodb::bson::{Bson, Document, doc};
use tracing::warn;

use crate::benchmark::report::{DocumentStats, Measurement};

/// Reads document count and sizes from `collStats`.
pub async fn collection_stats(source: &MongoSource) -> IssResult<DocumentStats> {
    let collection = source.collection().name().to_owned();
    let stats = source
        .database()
        .run_command(doc! { "collStats": collection.as_str() })
        .await?;

    Ok(DocumentStats {
        collection,
        document_count: number(&stats, "count") as u64,
        avg_object_size: number(&stats, "avgObjSize"),
        storage_size: number(&stats, "storageSize"),
    })
}

/// Times fetching every document matching `filter`.
pub async fn timed_find(source: &MongoSource, filter: Document) -> IssResult<Measurement> {
    let started = Instant::now();
    let documents: Vec<Document> = source
        .collection()
        .find(filter.clone())
        .await?
        .try_collect()
        .await?;
    let elapsed = started.elapsed();

    Ok(Measurement {
        elapsed,
        rows: documents.len() as u64,
        explain: explain_find(source, filter).await,
    })
}

/// Times a single-group aggregation computing the count and the average latitude.
pub async fn timed_aggregate(source: &MongoSource) -> IssResult<Measurement> {
    let pipeline = vec![doc! {
        "$group": {
            "_id": Bson::Null,
            "count": { "$sum": 1 },
            "avg_latitude": { "$avg": "$iss_position.latitude" },
        }
    }];

    let started = Instant::now();
    let groups: Vec<Document> = source
        .collection()
        .aggregate(pipeline)
        .await?
        .try_collect()
        .await?;
    let elapsed = started.elapsed();

    let explain = groups.first().map(|group| {
        let average = match group.get("avg_latitude") {
            Some(Bson::Double(average)) => format!("{average:.4}"),
            _ => "n/a".to_owned(),
        };
        format!(
            "count: {}, average latitude: {average}",
            number(group, "count") as u64
        )
    });

    Ok(Measurement {
        elapsed,
        rows: groups.len() as u64,
        explain,
    })
}

/// Times a server-side count of the documents matching `filter`.
pub async fn timed_count(source: &MongoSource, filter: Document) -> IssResult<Measurement> {
    let started = Instant::now();
    let count = source.collection().count_documents(filter).await?;
    let elapsed = started.elapsed();

    Ok(Measurement {
        elapsed,
        rows: count,
        explain: None,
    })
}

/// Summarizes the `executionStats` of a find with `filter`.
///
/// Explaining is best effort, a failure only loses the summary.
async fn explain_find(source: &MongoSource, filter: Document) -> Option<String> {
    let command = doc! {
        "explain": {
            "find": source.collection().name(),
            "filter": filter,
        },
        "verbosity": "executionStats",
    };

    match source.database().run_command(command).await {
        Ok(result) => {
            let stats = result.get_document("executionStats").ok()?;
            Some(format!(
                "docs examined: {}, returned: {}",
                number(stats, "totalDocsExamined") as u64,
                number(stats, "nReturned") as u64
            ))
        }
        Err(err) => {
            warn!(error = %err, "failed to explain document store query");
            None
        }
    }
}

/// Reads a numeric field whatever its BSON width, zero when absent.
fn number(document: &Document, key: &str) -> f64 {
    match document.get(key) {
        Some(Bson::Double(value)) => *value,
        Some(Bson::Int32(value)) => f64::from(*value),
        Some(Bson::Int64(value)) => *value as f64,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_read_whatever_their_width() {
        let stats = doc! {
            "count": 200_i32,
            "size": 22_400_i64,
            "avgObjSize": 112.5,
            "ns": "ISS_DB.ISS_loc",
        };

        assert_eq!(number(&stats, "count"), 200.0);
        assert_eq!(number(&stats, "size"), 22_400.0);
        assert_eq!(number(&stats, "avgObjSize"), 112.5);
        assert_eq!(number(&stats, "ns"), 0.0);
        assert_eq!(number(&stats, "storageSize"), 0.0);
    }
}
