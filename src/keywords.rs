//! Keyword dictionary: YAML records, policy filtering, compiled matcher.
//!
//! # Invariants
//! - Every word present in the compiled matcher is a key in the index.
//! - The dictionary is never empty: an empty load, and a policy filter
//!   that admits nothing, are load-time errors.
//! - Immutable after build; shared read-only across scan workers.
//!
//! # Policy filtering
//! With no filter every record is admitted unchanged. With a filter, a
//! record keeps the intersection of its policies with the filter and is
//! admitted when that intersection is non-empty or when it declared no
//! policies at all (universal keywords apply to every policy).

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::error::Error;
use crate::matcher::Machine;

/// One keyword record as it appears in the YAML keyword file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub word: String,
    #[serde(
        default,
        deserialize_with = "policies_or_empty",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub policies: BTreeMap<String, String>,
}

/// A bare or explicitly-null `policies:` key means "no policies".
fn policies_or_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let maybe = Option::<BTreeMap<String, String>>::deserialize(deserializer)?;
    Ok(maybe.unwrap_or_default())
}

/// A keyword occurrence joined with its policy metadata, ready for the
/// summary. `context` is carried as lossy UTF-8: the surrounding bytes may
/// be arbitrary binary and both output formats are text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hit {
    pub word: String,
    pub index: usize,
    pub context: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub policies: BTreeMap<String, String>,
}

/// The loaded dictionary: keyword index plus compiled matcher.
#[derive(Debug)]
pub struct Keywords {
    keywords: AHashMap<String, Keyword>,
    machine: Machine,
}

impl Keywords {
    /// Load and compile a dictionary from a YAML keyword file.
    ///
    /// `policies` of `None` means "all": no filtering.
    pub fn load_file(path: &Path, policies: Option<&[String]>) -> Result<Keywords, Error> {
        let file = File::open(path).map_err(|e| {
            Error::Config(format!(
                "cannot open keyword file {}: {e}",
                path.display()
            ))
        })?;
        Keywords::load_reader(file, policies)
    }

    /// Load and compile a dictionary from any byte source of YAML records.
    pub fn load_reader<R: Read>(mut reader: R, policies: Option<&[String]>) -> Result<Keywords, Error> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let records: Vec<Keyword> = serde_yaml::from_slice(&data)?;

        let mut keywords: AHashMap<String, Keyword> = AHashMap::new();
        for mut record in records {
            if record.word.is_empty() {
                return Err(Error::EmptyKeyword);
            }
            match policies {
                None => {
                    keywords.insert(record.word.clone(), record);
                }
                Some(filter) => {
                    let kept: BTreeMap<String, String> = filter
                        .iter()
                        .filter_map(|p| {
                            record.policies.get(p).map(|d| (p.clone(), d.clone()))
                        })
                        .collect();
                    if !kept.is_empty() || record.policies.is_empty() {
                        record.policies = kept;
                        keywords.insert(record.word.clone(), record);
                    }
                }
            }
        }

        if keywords.is_empty() {
            return match policies {
                None => Err(Error::EmptyKeywords),
                Some(filter) => Err(Error::NoPolicyMatch(filter.join(","))),
            };
        }

        // Compile from the sorted word list so construction is
        // deterministic regardless of map iteration order.
        let mut words: Vec<&str> = keywords.keys().map(String::as_str).collect();
        words.sort_unstable();
        let word_bytes: Vec<&[u8]> = words.iter().map(|w| w.as_bytes()).collect();
        let machine = Machine::build(&word_bytes)?;
        tracing::debug!("compiled dictionary of {} keywords", keywords.len());

        Ok(Keywords { keywords, machine })
    }

    /// Dictionary entries, sorted ascending by word.
    pub fn keywords(&self) -> Vec<Keyword> {
        let mut out: Vec<Keyword> = self.keywords.values().cloned().collect();
        out.sort_by(|a, b| a.word.cmp(&b.word));
        out
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Stream-scan one file, joining each match with the originating
    /// keyword's policy map.
    pub fn match_file(
        &self,
        path: &Path,
        context: usize,
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<Hit>, Error> {
        let file = File::open(path)?;
        let terms = self.machine.find_in_reader(file, context, false, cancel)?;

        let mut hits = Vec::with_capacity(terms.len());
        for term in terms {
            let word = String::from_utf8_lossy(&term.word).into_owned();
            let policies = self
                .keywords
                .get(&word)
                .map(|k| k.policies.clone())
                .unwrap_or_default();
            hits.push(Hit {
                word,
                index: term.pos,
                context: String::from_utf8_lossy(&term.context).into_owned(),
                policies,
            });
        }
        Ok(hits)
    }
}
