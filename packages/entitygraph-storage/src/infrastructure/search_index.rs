//! Tantivy full-text index over structural nodes
//!
//! ```text
//! commit → affected structural nodes → (path, node_type, text) → IndexWriter
//! ```
//!
//! The index is derived state: it lives in RAM and is rebuilt from the
//! database when a backend is opened.

use parking_lot::Mutex;
use tantivy::{
    collector::TopDocs,
    doc,
    query::{BooleanQuery, Occur, Query, TermQuery},
    schema::{Field, IndexRecordOption, Schema, Value, STORED, STRING, TEXT},
    tokenizer::TokenStream,
    Index, IndexReader, IndexWriter, ReloadPolicy, Term,
};

use crate::domain::{NodeType, RepoPath};
use crate::error::Result;

const WRITER_HEAP_BYTES: usize = 20_000_000;

/// Document for one structural node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedNode {
    pub path: RepoPath,
    pub node_type: NodeType,
    pub text: String,
}

pub struct FullTextIndex {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    path_field: Field,
    type_field: Field,
    text_field: Field,
}

impl FullTextIndex {
    pub fn in_ram() -> Result<Self> {
        let mut builder = Schema::builder();
        let path_field = builder.add_text_field("path", STRING | STORED);
        let type_field = builder.add_text_field("node_type", STRING);
        let text_field = builder.add_text_field("text", TEXT);
        let index = Index::create_in_ram(builder.build());

        let writer: IndexWriter = index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            reader,
            writer: Mutex::new(writer),
            path_field,
            type_field,
            text_field,
        })
    }

    /// Replace documents for `upserts` and drop documents for `removals`
    pub fn apply(&self, upserts: &[IndexedNode], removals: &[RepoPath]) -> Result<()> {
        if upserts.is_empty() && removals.is_empty() {
            return Ok(());
        }
        let mut writer = self.writer.lock();
        for path in removals.iter().chain(upserts.iter().map(|n| &n.path)) {
            writer.delete_term(Term::from_field_text(self.path_field, path.as_str()));
        }
        for node in upserts {
            writer.add_document(doc!(
                self.path_field => node.path.as_str(),
                self.type_field => node.node_type.as_str(),
                self.text_field => node.text.as_str(),
            ))?;
        }
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    pub fn search(
        &self,
        node_type: NodeType,
        terms: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RepoPath>> {
        let searcher = self.reader.searcher();

        let type_query: Box<dyn Query> = Box::new(TermQuery::new(
            Term::from_field_text(self.type_field, node_type.as_str()),
            IndexRecordOption::Basic,
        ));
        // Client text is never parsed as query syntax: each token becomes a
        // required term, so operators and field prefixes match as plain words
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, type_query)];
        let mut analyzer = self.index.tokenizer_for_field(self.text_field)?;
        let mut stream = analyzer.token_stream(terms);
        while stream.advance() {
            let term = Term::from_field_text(self.text_field, &stream.token().text);
            clauses.push((
                Occur::Must,
                Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
            ));
        }
        let query = BooleanQuery::new(clauses);

        // 0 = unbounded
        let limit = if limit == 0 {
            (searcher.num_docs() as usize).max(1)
        } else {
            limit
        };
        let top_docs =
            searcher.search(&query, &TopDocs::with_limit(limit).and_offset(offset))?;

        let mut paths = Vec::with_capacity(top_docs.len());
        for (_score, address) in top_docs {
            let doc: tantivy::TantivyDocument = searcher.doc(address)?;
            if let Some(path) = doc.get_first(self.path_field).and_then(|v| v.as_str()) {
                paths.push(RepoPath::parse(path)?);
            }
        }
        Ok(paths)
    }

    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(path: &str, node_type: NodeType, text: &str) -> IndexedNode {
        IndexedNode {
            path: RepoPath::parse(path).unwrap(),
            node_type,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_upsert_replaces_previous_document() {
        let index = FullTextIndex::in_ram().unwrap();
        index
            .apply(&[node("entities/e1", NodeType::IntellectualEntity, "old words")], &[])
            .unwrap();
        index
            .apply(&[node("entities/e1", NodeType::IntellectualEntity, "fresh words")], &[])
            .unwrap();

        assert_eq!(index.num_docs(), 1);
        assert!(index
            .search(NodeType::IntellectualEntity, "old", 0, 0)
            .unwrap()
            .is_empty());
        assert_eq!(
            index.search(NodeType::IntellectualEntity, "fresh", 0, 0).unwrap(),
            vec![RepoPath::parse("entities/e1").unwrap()]
        );
    }

    #[test]
    fn test_type_scope_and_conjunction() {
        let index = FullTextIndex::in_ram().unwrap();
        index
            .apply(
                &[
                    node("entities/e1", NodeType::IntellectualEntity, "alpha beta"),
                    node("entities/e2", NodeType::IntellectualEntity, "alpha"),
                    node("entities/e1/version-1/r1", NodeType::Representation, "alpha beta"),
                ],
                &[],
            )
            .unwrap();

        let hits = index.search(NodeType::IntellectualEntity, "alpha beta", 0, 0).unwrap();
        assert_eq!(hits, vec![RepoPath::parse("entities/e1").unwrap()]);

        let all_entities = index.search(NodeType::IntellectualEntity, "  ", 0, 0).unwrap();
        assert_eq!(all_entities.len(), 2);

        let limited = index.search(NodeType::IntellectualEntity, "", 1, 1).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_query_syntax_is_treated_as_words() {
        let index = FullTextIndex::in_ram().unwrap();
        index
            .apply(
                &[
                    node("entities/e1/version-1/r1", NodeType::Representation, "alpha"),
                    node("entities/e1/version-1/r2", NodeType::Representation, "gamma"),
                    node("entities/e1/version-1/r3", NodeType::Representation, "alpha or gamma"),
                ],
                &[],
            )
            .unwrap();

        assert_eq!(
            index.search(NodeType::Representation, "alpha OR gamma", 0, 0).unwrap(),
            vec![RepoPath::parse("entities/e1/version-1/r3").unwrap()]
        );
        assert_eq!(
            index.search(NodeType::Representation, "alpha)", 0, 0).unwrap().len(),
            2
        );
        assert!(index
            .search(NodeType::Representation, "-gamma text:alpha", 0, 0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_removal() {
        let index = FullTextIndex::in_ram().unwrap();
        let n = node("entities/e1/version-1/r1/f1", NodeType::File, "scan");
        index.apply(&[n.clone()], &[]).unwrap();
        index.apply(&[], &[n.path.clone()]).unwrap();
        assert!(index.search(NodeType::File, "scan", 0, 0).unwrap().is_empty());
    }
}
