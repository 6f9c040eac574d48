//! # Flat-File Sinks
//!
//! Per-subject clinical artifacts under the configured data directory:
//!
//! - `RESUMEN_TRANSCRIPCIONES_<document_id>.txt`: running transcript
//!   summary, one block appended per answered question
//! - `<pregunta_id>_analysis_<uuid8>.json`: full analysis artifact for one
//!   question
//! - `ANALISIS_<document_id>.csv`: append-only ledger of scoring records,
//!   header written exactly once
//!
//! All writes are append-or-create and never rewrite existing content; the
//! files are an audit trail, like the database table they mirror.

use crate::persistence::PersistError;
use crate::scoring::ScoringRecord;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Columns of the per-subject CSV ledger, in write order.
const LEDGER_HEADER: &str = "timestamp,pregunta_id,calificacion_pragmatica_dsm5,\
calificacion_pragmatica_ampliada,puntuacion_a1_uso_social,puntuacion_a2_ajuste_contexto,\
puntuacion_a3_normas_conversacionales,puntuacion_a4_comprension_no_literal,\
puntuacion_a5_coherencia,puntuacion_a6_cohesion,analisis_complejidad_sintactica,\
analisis_disfluencias,comentario_llm";

/// Flat-file persistence rooted at the clinical data directory.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the data directory if it does not exist yet.
    pub fn ensure_root(&self) -> Result<(), PersistError> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Resolve (and create) the directory holding one subject's artifacts.
    fn subject_dir(&self, document_id: &str) -> Result<PathBuf, PersistError> {
        let dir = self.root.join(document_id);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Append one question's transcript to the subject summary file.
    ///
    /// Block format matches the original service so existing tooling keeps
    /// reading the summaries.
    pub fn append_summary(
        &self,
        document_id: &str,
        pregunta_id: &str,
        transcription: &str,
    ) -> Result<(), PersistError> {
        let dir = self.subject_dir(document_id)?;
        let path = dir.join(format!("RESUMEN_TRANSCRIPCIONES_{}.txt", document_id));

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        write!(
            file,
            "--- PREGUNTA {} ---\nTranscripción: {}\n\n",
            pregunta_id, transcription
        )?;

        tracing::debug!(
            document_id = %document_id,
            pregunta_id = %pregunta_id,
            path = %path.display(),
            "Transcript appended to subject summary"
        );
        Ok(())
    }

    /// Write the full analysis of one question as an individual JSON file.
    ///
    /// The short uuid suffix keeps repeated answers to the same question from
    /// overwriting each other.
    pub fn write_analysis_artifact(
        &self,
        document_id: &str,
        pregunta_id: &str,
        transcription: &str,
        record: &ScoringRecord,
    ) -> Result<PathBuf, PersistError> {
        let dir = self.subject_dir(document_id)?;

        let suffix = uuid::Uuid::new_v4().to_string();
        let suffix = suffix.split('-').next().unwrap_or("0");
        let path = dir.join(format!("{}_analysis_{}.json", pregunta_id, suffix));

        let artifact = json!({
            "document_id": document_id,
            "pregunta_id": pregunta_id,
            "transcription": transcription,
            "analysis": record,
        });
        fs::write(&path, serde_json::to_string_pretty(&artifact).map_err(
            |e| PersistError::Io(e.to_string()),
        )?)?;

        tracing::debug!(
            document_id = %document_id,
            pregunta_id = %pregunta_id,
            path = %path.display(),
            "Analysis artifact written"
        );
        Ok(path)
    }

    /// Append one scoring record to the subject's CSV ledger.
    ///
    /// The header row is written only when the file is created.
    pub fn append_ledger(
        &self,
        document_id: &str,
        pregunta_id: &str,
        timestamp: DateTime<Utc>,
        record: &ScoringRecord,
    ) -> Result<(), PersistError> {
        let dir = self.subject_dir(document_id)?;
        let path = dir.join(format!("ANALISIS_{}.csv", document_id));

        let write_header = !path.exists();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        if write_header {
            writeln!(file, "{}", LEDGER_HEADER)?;
        }

        writeln!(
            file,
            "{},{},{},{},{},{},{},{},{},{},{},{},{}",
            timestamp.to_rfc3339(),
            csv_field(pregunta_id),
            record.dsm5_score,
            record.extended_score,
            record.social_use,
            record.context_adjustment,
            record.conversational_norms,
            record.nonliteral_comprehension,
            record.coherence,
            record.cohesion,
            record.syntactic_complexity,
            record.disfluencies,
            csv_field(&record.comment),
        )?;
        Ok(())
    }
}

/// Quote a CSV field when it contains a delimiter, quote or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ScoringPolicy;

    fn sample_record() -> ScoringRecord {
        ScoringPolicy::Heuristic.score("una respuesta de prueba con varias palabras", "P1")
    }

    #[test]
    fn test_summary_blocks_append_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.append_summary("DOC1", "P1", "primera respuesta").unwrap();
        store.append_summary("DOC1", "P2", "segunda respuesta").unwrap();

        let path = dir.path().join("DOC1").join("RESUMEN_TRANSCRIPCIONES_DOC1.txt");
        let content = fs::read_to_string(path).unwrap();
        let p1 = content.find("--- PREGUNTA P1 ---").unwrap();
        let p2 = content.find("--- PREGUNTA P2 ---").unwrap();
        assert!(p1 < p2);
        assert!(content.contains("Transcripción: primera respuesta"));
    }

    #[test]
    fn test_artifact_contains_all_analysis_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let record = sample_record();
        let path = store
            .write_analysis_artifact("DOC2", "P3", "una respuesta", &record)
            .unwrap();

        let artifact: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(artifact["document_id"], "DOC2");
        assert_eq!(artifact["pregunta_id"], "P3");
        assert_eq!(artifact["transcription"], "una respuesta");
        let analysis = &artifact["analysis"];
        for field in [
            "calificacion_pragmatica_dsm5",
            "calificacion_pragmatica_ampliada",
            "comentario_llm",
            "puntuacion_a1_uso_social",
            "puntuacion_a2_ajuste_contexto",
            "puntuacion_a3_normas_conversacionales",
            "puntuacion_a4_comprension_no_literal",
            "puntuacion_a5_coherencia",
            "puntuacion_a6_cohesion",
            "analisis_complejidad_sintactica",
            "analisis_disfluencias",
        ] {
            assert!(!analysis[field].is_null(), "missing field {}", field);
        }
    }

    #[test]
    fn test_repeated_artifacts_do_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let record = sample_record();

        let a = store
            .write_analysis_artifact("DOC3", "P1", "respuesta uno", &record)
            .unwrap();
        let b = store
            .write_analysis_artifact("DOC3", "P1", "respuesta dos", &record)
            .unwrap();
        assert_ne!(a, b);
        assert!(a.exists() && b.exists());
    }

    #[test]
    fn test_ledger_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let record = sample_record();

        store.append_ledger("DOC4", "P1", Utc::now(), &record).unwrap();
        store.append_ledger("DOC4", "P2", Utc::now(), &record).unwrap();

        let path = dir.path().join("DOC4").join("ANALISIS_DOC4.csv");
        let content = fs::read_to_string(path).unwrap();
        let headers = content.matches("timestamp,pregunta_id").count();
        assert_eq!(headers, 1);
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("simple"), "simple");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("di\"jo"), "\"di\"\"jo\"");
    }
}
