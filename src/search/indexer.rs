//! Indexing pipeline: catalog → encoder → vector index

use std::time::Instant;
use tracing::{debug, info, warn};

use super::embedding::TextEncoder;
use super::vectordb::{Collection, EntryMetadata, IndexEntry, VectorIndex};
use crate::core::catalog::{CatalogReader, RecordFilter};
use crate::core::config::{EmptyDescriptionPolicy, IndexingSettings};
use crate::core::error::{CatalogError, Result};
use crate::core::record::CatalogRecord;

#[derive(Debug, Clone, Copy)]
pub struct IndexingOptions {
    pub empty_description: EmptyDescriptionPolicy,
    pub batch_size: usize,
}

impl From<&IndexingSettings> for IndexingOptions {
    fn from(settings: &IndexingSettings) -> Self {
        Self {
            empty_description: settings.empty_description,
            batch_size: settings.batch_size.max(1),
        }
    }
}

impl Default for IndexingOptions {
    fn default() -> Self {
        Self::from(&IndexingSettings::default())
    }
}

#[derive(Debug, Default)]
pub struct IndexingStats {
    /// Records read from the catalog
    pub read: usize,
    /// Entries written to the index (includes zero vectors)
    pub indexed: usize,
    /// Records left out because their description was empty
    pub skipped: usize,
    /// Records indexed with an all-zero vector
    pub zero_vectors: usize,
    pub duration_ms: u128,
}

/// Builds a collection from the full catalog.
///
/// Writes are committed per batch. If a run fails part way, the collection is
/// left partially populated and must be dropped and rebuilt; there is no
/// resume.
pub struct Indexer<'a> {
    encoder: &'a dyn TextEncoder,
    options: IndexingOptions,
}

impl<'a> Indexer<'a> {
    pub fn new(encoder: &'a dyn TextEncoder, options: IndexingOptions) -> Self {
        Self { encoder, options }
    }

    /// Create the target collection, dropping an existing one first only when
    /// `rebuild` is set.
    pub fn create_collection<'i>(
        &self,
        index: &'i VectorIndex,
        name: &str,
        rebuild: bool,
    ) -> Result<Collection<'i>> {
        if rebuild && index.drop_collection(name)? {
            info!(collection = name, "dropped existing collection for rebuild");
        }
        index.create_collection(name, self.encoder.model_id(), self.encoder.dimension())
    }

    /// Encode every catalog record and add it to `collection`.
    ///
    /// `progress` is called once per entry written. Any error aborts the run.
    pub fn index_catalog<F>(
        &self,
        catalog: &CatalogReader,
        collection: &Collection<'_>,
        mut progress: F,
    ) -> Result<IndexingStats>
    where
        F: FnMut(&EntryMetadata),
    {
        let start = Instant::now();
        let mut stats = IndexingStats::default();
        let mut pending: Vec<CatalogRecord> = Vec::with_capacity(self.options.batch_size);

        catalog.scan(&RecordFilter::All, |record| {
            stats.read += 1;
            if !self.encoder.has_content(&record.description) {
                match self.options.empty_description {
                    EmptyDescriptionPolicy::Skip => {
                        warn!(id = record.id, name = %record.name, "empty description, product not indexed");
                        stats.skipped += 1;
                        return Ok(());
                    }
                    EmptyDescriptionPolicy::Reject => {
                        return Err(CatalogError::EmptyDescription { id: record.id });
                    }
                    EmptyDescriptionPolicy::ZeroVector => {
                        warn!(id = record.id, name = %record.name, "empty description, indexing zero vector");
                        stats.zero_vectors += 1;
                    }
                }
            }

            pending.push(record);
            if pending.len() >= self.options.batch_size {
                stats.indexed += self.flush(collection, &mut pending, &mut progress)?;
            }
            Ok(())
        })?;

        if !pending.is_empty() {
            stats.indexed += self.flush(collection, &mut pending, &mut progress)?;
        }

        stats.duration_ms = start.elapsed().as_millis();
        info!(
            collection = collection.name(),
            indexed = stats.indexed,
            skipped = stats.skipped,
            duration_ms = stats.duration_ms as u64,
            "indexing finished"
        );
        Ok(stats)
    }

    fn flush<F>(
        &self,
        collection: &Collection<'_>,
        pending: &mut Vec<CatalogRecord>,
        progress: &mut F,
    ) -> Result<usize>
    where
        F: FnMut(&EntryMetadata),
    {
        let texts: Vec<&str> = pending
            .iter()
            .filter(|r| self.encoder.has_content(&r.description))
            .map(|r| r.description.as_str())
            .collect();
        let mut vectors = self.encoder.encode_batch(&texts)?.into_iter();

        let mut entries = Vec::with_capacity(pending.len());
        for record in pending.iter() {
            let vector = if self.encoder.has_content(&record.description) {
                vectors.next().ok_or_else(|| {
                    CatalogError::Encoding {
                        message: "encoder returned fewer vectors than inputs".to_string(),
                    }
                })?
            } else {
                vec![0.0; self.encoder.dimension()]
            };
            entries.push(IndexEntry::new(record, vector));
        }

        let written = collection.add(&entries)?;
        for entry in &entries {
            debug!(id = entry.id, "embedding created");
            progress(&entry.metadata);
        }
        pending.clear();
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provision::CatalogLoader;
    use crate::search::embedding::HarmonicEncoder;

    fn record(id: i64, name: &str, description: &str) -> CatalogRecord {
        CatalogRecord {
            id,
            name: name.to_string(),
            price: id as f64,
            category: "Test".to_string(),
            description: description.to_string(),
        }
    }

    fn catalog(records: &[CatalogRecord]) -> CatalogReader {
        let loader = CatalogLoader::open_in_memory().unwrap();
        loader.load(records).unwrap();
        loader.into_reader().unwrap()
    }

    fn options(policy: EmptyDescriptionPolicy, batch_size: usize) -> IndexingOptions {
        IndexingOptions {
            empty_description: policy,
            batch_size,
        }
    }

    #[test]
    fn test_indexes_every_record_across_batches() -> Result<()> {
        let reader = catalog(&[
            record(1, "Red Mug", "A red ceramic mug"),
            record(2, "Kettle", "Stainless steel kettle"),
            record(3, "Tee", "Soft cotton t-shirt"),
        ]);
        let encoder = HarmonicEncoder::new(64)?;
        let index = VectorIndex::open_in_memory()?;
        let indexer = Indexer::new(&encoder, options(EmptyDescriptionPolicy::Skip, 2));
        let collection = indexer.create_collection(&index, "products", false)?;

        let mut seen = Vec::new();
        let stats = indexer.index_catalog(&reader, &collection, |m| seen.push(m.id))?;

        assert_eq!(stats.read, 3);
        assert_eq!(stats.indexed, 3);
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(collection.count()?, 3);
        assert_eq!(collection.info().model_id, "htp-64");
        Ok(())
    }

    #[test]
    fn test_metadata_copies_record() -> Result<()> {
        let reader = catalog(&[record(5, "Lamp", "Warm desk lamp")]);
        let encoder = HarmonicEncoder::new(32)?;
        let index = VectorIndex::open_in_memory()?;
        let indexer = Indexer::new(&encoder, IndexingOptions::default());
        let collection = indexer.create_collection(&index, "products", false)?;
        indexer.index_catalog(&reader, &collection, |_| {})?;

        let hits = collection.query(&encoder.encode("Warm desk lamp")?, 1)?;
        let meta = &hits[0].metadata;
        assert_eq!(meta.id, 5);
        assert_eq!(meta.name, "Lamp");
        assert_eq!(meta.price, "5.00");
        assert_eq!(meta.category, "Test");
        assert_eq!(meta.description, "Warm desk lamp");
        Ok(())
    }

    #[test]
    fn test_empty_description_policies() -> Result<()> {
        let records = [record(1, "Mug", "ceramic mug"), record(2, "Mystery", "")];
        let encoder = HarmonicEncoder::new(32)?;

        let index = VectorIndex::open_in_memory()?;
        let skip = Indexer::new(&encoder, options(EmptyDescriptionPolicy::Skip, 8));
        let collection = skip.create_collection(&index, "skip", false)?;
        let stats = skip.index_catalog(&catalog(&records), &collection, |_| {})?;
        assert_eq!((stats.indexed, stats.skipped), (1, 1));
        assert!(!collection.contains(2)?);

        let zero = Indexer::new(&encoder, options(EmptyDescriptionPolicy::ZeroVector, 8));
        let collection = zero.create_collection(&index, "zero", false)?;
        let stats = zero.index_catalog(&catalog(&records), &collection, |_| {})?;
        assert_eq!((stats.indexed, stats.zero_vectors), (2, 1));
        assert!(collection.contains(2)?);

        let reject = Indexer::new(&encoder, options(EmptyDescriptionPolicy::Reject, 8));
        let collection = reject.create_collection(&index, "reject", false)?;
        let result = reject.index_catalog(&catalog(&records), &collection, |_| {});
        assert!(matches!(result, Err(CatalogError::EmptyDescription { id: 2 })));
        Ok(())
    }

    #[test]
    fn test_punctuation_only_description_counts_as_empty() -> Result<()> {
        let records = [record(1, "Mug", "A red ceramic mug"), record(2, "Dash", "---")];
        let encoder = HarmonicEncoder::new(32)?;
        let index = VectorIndex::open_in_memory()?;

        let skip = Indexer::new(&encoder, options(EmptyDescriptionPolicy::Skip, 8));
        let collection = skip.create_collection(&index, "skip", false)?;
        let stats = skip.index_catalog(&catalog(&records), &collection, |_| {})?;
        assert_eq!((stats.indexed, stats.skipped, stats.zero_vectors), (1, 1, 0));
        assert!(!collection.contains(2)?);

        let zero = Indexer::new(&encoder, options(EmptyDescriptionPolicy::ZeroVector, 8));
        let collection = zero.create_collection(&index, "zero", false)?;
        let stats = zero.index_catalog(&catalog(&records), &collection, |_| {})?;
        assert_eq!((stats.indexed, stats.skipped, stats.zero_vectors), (2, 0, 1));

        let reject = Indexer::new(&encoder, options(EmptyDescriptionPolicy::Reject, 8));
        let collection = reject.create_collection(&index, "reject", false)?;
        let result = reject.index_catalog(&catalog(&records), &collection, |_| {});
        assert!(matches!(result, Err(CatalogError::EmptyDescription { id: 2 })));
        Ok(())
    }

    #[test]
    fn test_existing_collection_needs_rebuild() -> Result<()> {
        let reader = catalog(&[record(1, "Mug", "ceramic mug")]);
        let encoder = HarmonicEncoder::new(32)?;
        let index = VectorIndex::open_in_memory()?;
        let indexer = Indexer::new(&encoder, IndexingOptions::default());

        {
            let collection = indexer.create_collection(&index, "products", false)?;
            indexer.index_catalog(&reader, &collection, |_| {})?;
        }
        assert!(matches!(
            indexer.create_collection(&index, "products", false),
            Err(CatalogError::IndexAlreadyExists { .. })
        ));

        let rebuilt = indexer.create_collection(&index, "products", true)?;
        assert_eq!(rebuilt.count()?, 0);
        indexer.index_catalog(&reader, &rebuilt, |_| {})?;
        assert_eq!(rebuilt.count()?, 1);
        Ok(())
    }

    #[test]
    fn test_second_run_into_same_collection_is_duplicate() -> Result<()> {
        let reader = catalog(&[record(1, "Mug", "ceramic mug")]);
        let encoder = HarmonicEncoder::new(32)?;
        let index = VectorIndex::open_in_memory()?;
        let indexer = Indexer::new(&encoder, IndexingOptions::default());
        let collection = indexer.create_collection(&index, "products", false)?;

        indexer.index_catalog(&reader, &collection, |_| {})?;
        let again = indexer.index_catalog(&reader, &collection, |_| {});
        assert!(matches!(again, Err(CatalogError::DuplicateKey { id: 1, .. })));
        Ok(())
    }
}
