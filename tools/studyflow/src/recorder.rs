use crate::catalog::TrialCatalog;
use crate::errors::StudyError;
use crate::logging::append_run_log;
use crate::runtime::{Clock, FileSystem};
use crate::types::{Participant, RecordedFiles, TrialResponse};
use chrono::{DateTime, Local};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

pub const CSV_HEADER: [&str; 12] = [
    "ParticipantID",
    "TrialNum",
    "ErrorType",
    "ExplanationQuality",
    "Clarity",
    "Sufficiency",
    "PredictiveCapability",
    "Actionability",
    "Trustworthiness",
    "Accountability",
    "Satisfaction",
    "ControlVar",
];

const DATA_SUFFIX: &str = ".csv";
const COMMENT_SUFFIX: &str = "_comment.txt";

/// Writes one participant's ratings (and optional comment) into the data dir.
pub struct ResponseRecorder {
    data_dir: PathBuf,
    file_system: Arc<dyn FileSystem>,
    clock: Arc<dyn Clock>,
}

impl ResponseRecorder {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        file_system: Arc<dyn FileSystem>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            file_system,
            clock,
        }
    }

    /// Returns `Ok(None)` without touching disk when the participant, the
    /// responses or the trial order is missing.
    pub fn record(
        &self,
        catalog: &TrialCatalog,
        participant: Option<&Participant>,
        responses: &[TrialResponse],
        trial_order: &[usize],
        comment: &str,
    ) -> Result<Option<RecordedFiles>, StudyError> {
        let Some(participant) = participant else {
            append_run_log("debug", "recorder.skipped", json!({ "reason": "no_participant" }));
            return Ok(None);
        };
        if responses.is_empty() || trial_order.is_empty() {
            append_run_log(
                "debug",
                "recorder.skipped",
                json!({
                    "participant_id": participant.id,
                    "responses": responses.len(),
                    "trial_order": trial_order.len(),
                }),
            );
            return Ok(None);
        }

        let contents = render_csv(catalog, participant, responses)?;
        let stamp = DateTime::<Local>::from(self.clock.now())
            .format("%Y%m%d_%H%M%S")
            .to_string();
        let file_name = data_file_name(&participant.id, &stamp);

        self.file_system.create_dir_all(&self.data_dir)?;
        let data_file = self.data_dir.join(&file_name);
        self.file_system.write_string(&data_file, &contents)?;

        let comment_file = if comment.is_empty() {
            None
        } else {
            let path = self.data_dir.join(comment_file_name(&file_name));
            self.file_system.write_string(&path, comment)?;
            Some(path)
        };

        append_run_log(
            "info",
            "recorder.files.written",
            json!({
                "participant_id": participant.id,
                "rows": responses.len(),
                "data_file": data_file.display().to_string(),
                "comment_file": comment_file.as_ref().map(|p| p.display().to_string()),
            }),
        );

        Ok(Some(RecordedFiles {
            data_file,
            comment_file,
        }))
    }
}

pub fn render_csv(
    catalog: &TrialCatalog,
    participant: &Participant,
    responses: &[TrialResponse],
) -> Result<String, StudyError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(CSV_HEADER)
        .map_err(|e| StudyError::Serialization(e.to_string()))?;

    for (position, response) in responses.iter().enumerate() {
        let trial = catalog.main_trial(response.trial_idx)?;
        let quality = trial.explanation_quality.ok_or_else(|| {
            StudyError::Catalog(format!("main trial {} has no explanation quality", trial.id))
        })?;
        let mut row = Vec::with_capacity(CSV_HEADER.len());
        row.push(participant.id.clone());
        row.push((position + 1).to_string());
        row.push(trial.error_type.as_str().to_string());
        row.push(quality.as_str().to_string());
        row.extend(response.ratings.as_array().iter().map(i64::to_string));
        row.push(participant.control_var.clone());
        writer
            .write_record(&row)
            .map_err(|e| StudyError::Serialization(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| StudyError::Serialization(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| StudyError::Serialization(e.to_string()))
}

pub fn data_file_name(participant_id: &str, stamp: &str) -> String {
    format!(
        "participant_{}_{stamp}{DATA_SUFFIX}",
        file_safe(participant_id)
    )
}

pub fn comment_file_name(data_file_name: &str) -> String {
    match data_file_name.strip_suffix(DATA_SUFFIX) {
        Some(stem) => format!("{stem}{COMMENT_SUFFIX}"),
        None => format!("{data_file_name}{COMMENT_SUFFIX}"),
    }
}

fn file_safe(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{FakeClock, FakeFileSystem};
    use crate::types::Ratings;

    fn ratings(base: i64) -> Ratings {
        Ratings {
            clarity: base,
            sufficiency: base + 1,
            predictive_capability: base + 2,
            actionability: base + 3,
            trustworthiness: base + 4,
            accountability: base + 5,
            satisfaction: base + 6,
        }
    }

    fn participant(id: &str) -> Participant {
        Participant {
            id: id.to_string(),
            control_var: "night shift".to_string(),
        }
    }

    #[test]
    fn csv_rows_follow_completion_order_with_catalog_metadata() {
        let responses = [
            TrialResponse {
                trial_idx: 31,
                ratings: ratings(1),
            },
            TrialResponse {
                trial_idx: 0,
                ratings: ratings(0),
            },
        ];
        let text = render_csv(&TrialCatalog::standard(), &participant("P1"), &responses)
            .expect("render");
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER.join(","));
        assert_eq!(lines[1], "P1,1,FN,Good,1,2,3,4,5,6,7,night shift");
        assert_eq!(lines[2], "P1,2,FP,Poor,0,1,2,3,4,5,6,night shift");
    }

    #[test]
    fn csv_quotes_values_containing_delimiters() {
        let who = Participant {
            id: "P,1".to_string(),
            control_var: "a \"quoted\" group".to_string(),
        };
        let responses = [TrialResponse {
            trial_idx: 8,
            ratings: ratings(3),
        }];
        let text = render_csv(&TrialCatalog::standard(), &who, &responses).expect("render");
        let row = text.lines().nth(1).expect("data row");
        assert!(row.starts_with("\"P,1\",1,FP,Good,"));
        assert!(row.ends_with("\"a \"\"quoted\"\" group\""));
    }

    #[test]
    fn unknown_trial_index_fails_instead_of_skipping() {
        let responses = [TrialResponse {
            trial_idx: 99,
            ratings: ratings(1),
        }];
        let err = render_csv(&TrialCatalog::standard(), &participant("P1"), &responses)
            .expect_err("must fail");
        assert!(matches!(err, StudyError::Catalog(_)));
    }

    #[test]
    fn file_names_are_sanitized_and_comment_name_is_derived() {
        let name = data_file_name("../evil id", "20240102_030405");
        assert_eq!(name, "participant____evil_id_20240102_030405.csv");
        assert_eq!(
            comment_file_name(&name),
            "participant____evil_id_20240102_030405_comment.txt"
        );
    }

    #[test]
    fn record_writes_data_and_comment_files() {
        let fs = FakeFileSystem::default();
        let recorder = ResponseRecorder::new(
            "/study/data",
            Arc::new(fs.clone()),
            Arc::new(FakeClock::default()),
        );
        let responses = [TrialResponse {
            trial_idx: 16,
            ratings: ratings(2),
        }];

        let files = recorder
            .record(
                &TrialCatalog::standard(),
                Some(&participant("P9")),
                &responses,
                &[16],
                "Interesting study",
            )
            .expect("record")
            .expect("files written");

        assert!(files.data_file.starts_with("/study/data"));
        let data_name = files
            .data_file
            .file_name()
            .and_then(|n| n.to_str())
            .expect("file name");
        assert!(data_name.starts_with("participant_P9_"));
        assert!(data_name.ends_with(".csv"));

        let comment_file = files.comment_file.expect("comment file");
        assert_eq!(
            comment_file.file_name().and_then(|n| n.to_str()),
            Some(comment_file_name(data_name).as_str())
        );
        assert_eq!(fs.file(&comment_file).as_deref(), Some("Interesting study"));
        assert_eq!(fs.created_dirs(), vec![PathBuf::from("/study/data")]);
        assert_eq!(
            fs.file(&files.data_file).expect("data").lines().count(),
            2
        );
    }

    #[test]
    fn record_is_a_no_op_for_incomplete_sessions() {
        let fs = FakeFileSystem::default();
        let recorder =
            ResponseRecorder::new("/d", Arc::new(fs.clone()), Arc::new(FakeClock::default()));
        let catalog = TrialCatalog::standard();
        let responses = [TrialResponse {
            trial_idx: 1,
            ratings: ratings(1),
        }];

        assert!(recorder
            .record(&catalog, None, &responses, &[1], "c")
            .expect("no participant")
            .is_none());
        assert!(recorder
            .record(&catalog, Some(&participant("P1")), &[], &[1], "c")
            .expect("no responses")
            .is_none());
        assert!(recorder
            .record(&catalog, Some(&participant("P1")), &responses, &[], "c")
            .expect("no order")
            .is_none());
        assert!(fs.file_paths().is_empty());
        assert!(fs.created_dirs().is_empty());
    }

    #[test]
    fn empty_comment_writes_no_sidecar() {
        let fs = FakeFileSystem::default();
        let recorder =
            ResponseRecorder::new("/d", Arc::new(fs.clone()), Arc::new(FakeClock::default()));
        let files = recorder
            .record(
                &TrialCatalog::standard(),
                Some(&participant("P2")),
                &[TrialResponse {
                    trial_idx: 5,
                    ratings: ratings(1),
                }],
                &[5],
                "",
            )
            .expect("record")
            .expect("files");
        assert!(files.comment_file.is_none());
        assert_eq!(fs.file_paths(), vec![files.data_file]);
    }
}
