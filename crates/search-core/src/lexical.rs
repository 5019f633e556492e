//! BM25 lexical index (C3): persists the tokenized corpus in an embedded
//! full-text index and serves top-k lexical search. Falls back to a simple
//! in-memory token-overlap scorer if the FTS engine cannot be opened.

use anyhow::Result;
use common::Chunk;
use std::path::Path;
use tantivy::schema::Value;
use tantivy::{
    Index, IndexReader, IndexWriter, TantivyDocument, Term,
    collector::TopDocs,
    query::{BooleanQuery, Occur, Query, TermQuery},
    schema::{Field, IndexRecordOption, STORED, STRING, Schema, TEXT},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalSearchConfig {
    pub default_top_k: usize,
}

impl Default for LexicalSearchConfig {
    fn default() -> Self {
        Self { default_top_k: 20 }
    }
}

pub struct TantivyLexicalIndex {
    index: Index,
    reader: IndexReader,
    writer: IndexWriter,
    fields: TantivyFields,
}

#[derive(Clone, Copy)]
struct TantivyFields {
    source: Field,
    content: Field,
}

impl TantivyLexicalIndex {
    pub fn new_in_memory() -> Result<Self> {
        let schema = build_schema();
        let index = Index::create_in_ram(schema);
        from_index(index)
    }

    pub fn open_or_create_on_disk(index_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_dir)?;
        let schema = build_schema();
        let meta = index_dir.join("meta.json");
        let index = if meta.exists() {
            Index::open_in_dir(index_dir)?
        } else {
            Index::create_in_dir(index_dir, schema)?
        };
        from_index(index)
    }

    /// Clears all documents, used by the wholesale rebuild the incremental
    /// indexer performs on every update (see `SPEC_FULL.md` section 4.5).
    pub fn reset(&mut self) -> Result<()> {
        self.writer.delete_all_documents()?;
        self.writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    pub fn add_chunk(&mut self, chunk: &Chunk) -> Result<()> {
        let mut doc = TantivyDocument::default();
        doc.add_text(self.fields.source, &chunk.source);
        doc.add_text(self.fields.content, &chunk.text);
        self.writer.add_document(doc)?;
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        self.writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    /// Returns `(source, bm25_score)` pairs for the top `top_k` matches.
    ///
    /// Builds an OR-of-terms query from the index's own tokenizer rather
    /// than going through `QueryParser::parse_query`, so query syntax
    /// characters a caller's free-text query happens to contain (`:`, `(`,
    /// unmatched quotes, boolean keywords) are treated as literal content to
    /// search for instead of failing to parse (`SPEC_FULL.md` section 4.3's
    /// query tokenization is symmetric with document tokenization).
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<(String, f32)>> {
        let searcher = self.reader.searcher();
        let terms = self.tokenize_query(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let clauses: Vec<(Occur, Box<dyn Query>)> = terms
            .into_iter()
            .map(|term| {
                let term_query = TermQuery::new(term, IndexRecordOption::WithFreqsAndPositions);
                (Occur::Should, Box::new(term_query) as Box<dyn Query>)
            })
            .collect();
        let parsed = BooleanQuery::new(clauses);
        let docs = searcher.search(&parsed, &TopDocs::with_limit(top_k))?;

        let mut out = Vec::new();
        for (score, address) in docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            if let Some(source) = doc.get_first(self.fields.source) {
                if let Some(s) = source.as_value().as_str() {
                    out.push((s.to_string(), score));
                }
            }
        }
        Ok(out)
    }

    /// Tokenizes `query` with the same analyzer the `content` field indexes
    /// with, so query terms line up with indexed terms regardless of
    /// punctuation in the raw query string.
    fn tokenize_query(&self, query: &str) -> Vec<Term> {
        let mut analyzer = self
            .index
            .tokenizers()
            .get("default")
            .expect("default tokenizer is registered by tantivy for every index");
        let mut stream = analyzer.token_stream(query);
        let mut terms = Vec::new();
        while stream.advance() {
            terms.push(Term::from_field_text(self.fields.content, &stream.token().text));
        }
        terms
    }
}

fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();
    let _ = schema_builder.add_text_field("source", STRING | STORED);
    let _ = schema_builder.add_text_field("content", TEXT | STORED);
    schema_builder.build()
}

fn from_index(index: Index) -> Result<TantivyLexicalIndex> {
    let schema = index.schema();
    let source = schema.get_field("source")?;
    let content = schema.get_field("content")?;

    let writer = index.writer(50_000_000)?;
    let reader = index.reader()?;
    Ok(TantivyLexicalIndex {
        index,
        reader,
        writer,
        fields: TantivyFields { source, content },
    })
}

/// Degraded-mode scorer used when the FTS engine fails to open: counts query
/// tokens present in each chunk's text.
pub struct DegradedLexicalIndex {
    chunks: Vec<Chunk>,
}

impl DegradedLexicalIndex {
    #[must_use]
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self { chunks }
    }

    #[must_use]
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(String, f32)> {
        let query_tokens: Vec<String> = tokenize(query);
        let mut scored: Vec<(String, f32)> = self
            .chunks
            .iter()
            .map(|chunk| {
                let text_lower = chunk.text.to_lowercase();
                let score = query_tokens
                    .iter()
                    .filter(|t| text_lower.contains(t.as_str()))
                    .count() as f32;
                (chunk.source.clone(), score)
            })
            .filter(|(_, score)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);
        scored
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let re = regex_lite();
    re.find_iter(&text.to_lowercase()).map(|m| m.as_str().to_string()).collect()
}

fn regex_lite() -> &'static regex::Regex {
    static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"[\w#@/.\-]+").expect("valid tokenizer regex"))
}
