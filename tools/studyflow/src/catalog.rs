use crate::errors::StudyError;
use crate::types::{ErrorType, ExplanationQuality};
use serde::Serialize;

pub const PRACTICE_SIZE: usize = 2;
pub const MAIN_POOL_SIZE: usize = 32;
pub const TRIALS_PER_SESSION: usize = 16;

/// Each error type x quality cell of the main pool holds this many trials.
pub const TRIALS_PER_CELL: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trial {
    pub id: &'static str,
    pub description: &'static str,
    pub ai_decision: &'static str,
    pub ground_truth: &'static str,
    pub error_type: ErrorType,
    pub explanation: &'static str,
    pub explanation_quality: Option<ExplanationQuality>,
}

/// Read-only view over the practice set and the main pool.
#[derive(Debug, Clone, Copy)]
pub struct TrialCatalog {
    pub practice: &'static [Trial],
    pub main: &'static [Trial],
}

impl TrialCatalog {
    pub fn standard() -> Self {
        Self {
            practice: &PRACTICE_TRIALS,
            main: &MAIN_TRIALS,
        }
    }

    pub fn practice_trial(&self, index: usize) -> Option<&'static Trial> {
        self.practice.get(index)
    }

    pub fn main_trial(&self, index: usize) -> Result<&'static Trial, StudyError> {
        self.main.get(index).ok_or_else(|| {
            StudyError::Catalog(format!(
                "trial index {index} outside main pool of {}",
                self.main.len()
            ))
        })
    }

    pub fn validate(&self) -> Result<CatalogSummary, StudyError> {
        if self.main.len() < TRIALS_PER_SESSION {
            return Err(StudyError::Catalog(format!(
                "main pool has {} trials, need at least {TRIALS_PER_SESSION}",
                self.main.len()
            )));
        }
        if let Some(trial) = self.practice.iter().find(|t| t.explanation_quality.is_some()) {
            return Err(StudyError::Catalog(format!(
                "practice trial {} must not carry an explanation quality",
                trial.id
            )));
        }
        for error_type in [ErrorType::FalsePositive, ErrorType::FalseNegative] {
            if !self.practice.iter().any(|t| t.error_type == error_type) {
                return Err(StudyError::Catalog(format!(
                    "practice set has no {} trial",
                    error_type.as_str()
                )));
            }
        }

        let mut cells = [[0usize; 2]; 2];
        for trial in self.main {
            let quality = trial.explanation_quality.ok_or_else(|| {
                StudyError::Catalog(format!(
                    "main trial {} is missing its explanation quality",
                    trial.id
                ))
            })?;
            cells[error_type_slot(trial.error_type)][quality_slot(quality)] += 1;
        }

        let mut ids = std::collections::BTreeSet::new();
        for trial in self.practice.iter().chain(self.main) {
            if !ids.insert(trial.id) {
                return Err(StudyError::Catalog(format!("duplicate trial id {}", trial.id)));
            }
        }

        Ok(CatalogSummary {
            practice: self.practice.len(),
            main: self.main.len(),
            fp_poor: cells[0][0],
            fp_good: cells[0][1],
            fn_poor: cells[1][0],
            fn_good: cells[1][1],
        })
    }
}

impl Default for TrialCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogSummary {
    pub practice: usize,
    pub main: usize,
    pub fp_poor: usize,
    pub fp_good: usize,
    pub fn_poor: usize,
    pub fn_good: usize,
}

impl CatalogSummary {
    pub fn render_line(&self) -> String {
        format!(
            "catalog ok: practice={} main={} fp_poor={} fp_good={} fn_poor={} fn_good={}",
            self.practice, self.main, self.fp_poor, self.fp_good, self.fn_poor, self.fn_good
        )
    }
}

fn error_type_slot(error_type: ErrorType) -> usize {
    match error_type {
        ErrorType::FalsePositive => 0,
        ErrorType::FalseNegative => 1,
    }
}

fn quality_slot(quality: ExplanationQuality) -> usize {
    match quality {
        ExplanationQuality::Poor => 0,
        ExplanationQuality::Good => 1,
    }
}

pub static PRACTICE_TRIALS: [Trial; PRACTICE_SIZE] = [
    Trial {
        id: "PRAC_FP",
        description: "A patient shows mild cough and runny nose, but the chest X-ray image appears normal.",
        ai_decision: "The AI predicts that the patient has pneumonia (positive).",
        ground_truth: "The patient does not have pneumonia (false positive).",
        error_type: ErrorType::FalsePositive,
        explanation: "The system noticed higher brightness in the image center and therefore predicted pneumonia.",
        explanation_quality: None,
    },
    Trial {
        id: "PRAC_FN",
        description: "A patient has a temperature of 38.8°C along with shortness of breath and chest tightness.",
        ai_decision: "The AI predicts that the patient does not have pneumonia (negative).",
        ground_truth: "The patient does have pneumonia (false negative).",
        error_type: ErrorType::FalseNegative,
        explanation: "The model did not detect abnormal patterns, so it kept the negative prediction.",
        explanation_quality: None,
    },
];

pub static MAIN_TRIALS: [Trial; MAIN_POOL_SIZE] = [
    // FP / Poor
    Trial {
        id: "FP_Poor_1",
        description: "An online homework submission shows two minor similarities to a classmate, but the system logs match normal behavior.",
        ai_decision: "The AI flags the student for plagiarism (positive).",
        ground_truth: "The student did not plagiarize (false positive).",
        error_type: ErrorType::FalsePositive,
        explanation: "The system thought the answers looked too similar, so it labeled the submission as plagiarism.",
        explanation_quality: Some(ExplanationQuality::Poor),
    },
    Trial {
        id: "FP_Poor_2",
        description: "A customer makes a nighttime credit card purchase of $120, which fits their typical spending pattern.",
        ai_decision: "The AI flags the purchase as fraud (positive).",
        ground_truth: "The transaction is legitimate (false positive).",
        error_type: ErrorType::FalsePositive,
        explanation: "The model saw the amount appear suddenly and assumed it must be fraud.",
        explanation_quality: Some(ExplanationQuality::Poor),
    },
    Trial {
        id: "FP_Poor_3",
        description: "Factory sensors occasionally show a temperature spike, yet the average readings remain normal.",
        ai_decision: "The AI predicts the equipment is about to fail (positive).",
        ground_truth: "The equipment is operating normally (false positive).",
        error_type: ErrorType::FalsePositive,
        explanation: "Because the data looked jumpy, the system concluded the machine would soon break.",
        explanation_quality: Some(ExplanationQuality::Poor),
    },
    Trial {
        id: "FP_Poor_4",
        description: "A patient’s blood glucose is measured at 6.0 mmol/L, which is within the healthy range.",
        ai_decision: "The AI flags the blood glucose as abnormal (positive).",
        ground_truth: "The level is normal (false positive).",
        error_type: ErrorType::FalsePositive,
        explanation: "The model saw the number was not 5, so it labeled it as abnormal.",
        explanation_quality: Some(ExplanationQuality::Poor),
    },
    Trial {
        id: "FP_Poor_5",
        description: "Airport security scans a traveler’s bag containing a 90 ml bottle, and valid documentation is provided.",
        ai_decision: "The AI flags the liquid as prohibited (positive).",
        ground_truth: "The item fully complies with regulations (false positive).",
        error_type: ErrorType::FalsePositive,
        explanation: "The system thought the liquid looked dangerous and therefore denied it.",
        explanation_quality: Some(ExplanationQuality::Poor),
    },
    Trial {
        id: "FP_Poor_6",
        description: "A smart agriculture monitor notices a slightly lighter color on one plot of leaves.",
        ai_decision: "The AI predicts a crop disease outbreak (positive).",
        ground_truth: "The leaves are healthy (false positive).",
        error_type: ErrorType::FalsePositive,
        explanation: "Because the color seemed off, the model assumed there was a disease.",
        explanation_quality: Some(ExplanationQuality::Poor),
    },
    Trial {
        id: "FP_Poor_7",
        description: "A call-center sentiment tool detects minor pitch fluctuations in a customer’s voice.",
        ai_decision: "The AI labels the caller as extremely angry (positive).",
        ground_truth: "The caller’s tone is calm (false positive).",
        error_type: ErrorType::FalsePositive,
        explanation: "The system heard some variation and decided the caller must be upset.",
        explanation_quality: Some(ExplanationQuality::Poor),
    },
    Trial {
        id: "FP_Poor_8",
        description: "A smart logistics scale finds a package weighing 30 grams more than the label indicates.",
        ai_decision: "The AI flags the package as hazardous (positive).",
        ground_truth: "The weight difference is normal variance (false positive).",
        error_type: ErrorType::FalsePositive,
        explanation: "The model saw a slight excess weight and triggered an alarm.",
        explanation_quality: Some(ExplanationQuality::Poor),
    },
    // FP / Good
    Trial {
        id: "FP_Good_1",
        description: "A warehouse security camera captures nighttime movement and a brief spike in heat signatures.",
        ai_decision: "The AI reports an intruder (positive).",
        ground_truth: "It was a security guard on patrol (false positive).",
        error_type: ErrorType::FalsePositive,
        explanation: "The system matched the unusual motion pattern and heat peak with past intrusion incidents, leading to an alert.",
        explanation_quality: Some(ExplanationQuality::Good),
    },
    Trial {
        id: "FP_Good_2",
        description: "A university network logs 30 login attempts from the same IP over 30 minutes.",
        ai_decision: "The AI flags a brute-force attack (positive).",
        ground_truth: "A student simply forgot their password (false positive).",
        error_type: ErrorType::FalsePositive,
        explanation: "The model compared the failure frequency and timing to known attack patterns, so it raised an alarm.",
        explanation_quality: Some(ExplanationQuality::Good),
    },
    Trial {
        id: "FP_Good_3",
        description: "An autonomous car detects flickering reflections ahead while radar readings stay steady.",
        ai_decision: "The AI reports an obstacle (positive).",
        ground_truth: "The reflection came from a wet road surface (false positive).",
        error_type: ErrorType::FalsePositive,
        explanation: "Visual sensors found bright points matching obstacle signatures, so the system issued a hazard warning despite radar stability.",
        explanation_quality: Some(ExplanationQuality::Good),
    },
    Trial {
        id: "FP_Good_4",
        description: "A banking risk model observes three large international transfers in quick succession.",
        ai_decision: "The AI flags the account as compromised (positive).",
        ground_truth: "The customer is paying overseas tuition (false positive).",
        error_type: ErrorType::FalsePositive,
        explanation: "Short-term spikes in amount, geography, and frequency resembled past fraud cases, so it triggered a security warning.",
        explanation_quality: Some(ExplanationQuality::Good),
    },
    Trial {
        id: "FP_Good_5",
        description: "A public health dashboard registers three consecutive days of elevated temperatures in one neighborhood.",
        ai_decision: "The AI declares a flu outbreak (positive).",
        ground_truth: "The community is healthy (false positive).",
        error_type: ErrorType::FalsePositive,
        explanation: "The model compared rolling averages with historical baselines and found a sustained increase that exceeded its alert threshold.",
        explanation_quality: Some(ExplanationQuality::Good),
    },
    Trial {
        id: "FP_Good_6",
        description: "An academic integrity tool finds a 42% similarity between a student paper and database sources.",
        ai_decision: "The AI flags the paper for plagiarism (positive).",
        ground_truth: "The citations follow proper style (false positive).",
        error_type: ErrorType::FalsePositive,
        explanation: "Extended sections matched existing text and the reference count was below the model’s benchmark, so it labeled the submission as a violation.",
        explanation_quality: Some(ExplanationQuality::Good),
    },
    Trial {
        id: "FP_Good_7",
        description: "A warehouse robot registers that a pallet is tilted 6 degrees, slightly above the safety limit.",
        ai_decision: "The AI predicts the pallet will collapse (positive).",
        ground_truth: "The pallet remains stable (false positive).",
        error_type: ErrorType::FalsePositive,
        explanation: "The gyroscope exceeded 5 degrees for over 20 seconds, matching previous collapse data, so the system sent a warning.",
        explanation_quality: Some(ExplanationQuality::Good),
    },
    Trial {
        id: "FP_Good_8",
        description: "An anti-money-laundering system spots multiple transfers to the same offshore account within seven days.",
        ai_decision: "The AI flags the activity as potential laundering (positive).",
        ground_truth: "The customer is making legitimate investments (false positive).",
        error_type: ErrorType::FalsePositive,
        explanation: "Transaction frequency, amounts, and destination all aligned with high-risk patterns in the training data, so it labeled the account as high risk.",
        explanation_quality: Some(ExplanationQuality::Good),
    },
    // FN / Poor
    Trial {
        id: "FN_Poor_1",
        description: "A patient runs a fever of 39°C with a rapid pulse and a productive cough.",
        ai_decision: "The AI predicts the patient does not have pneumonia (negative).",
        ground_truth: "The patient has pneumonia (false negative).",
        error_type: ErrorType::FalseNegative,
        explanation: "The system did not see anything special, so it assumed the patient was fine.",
        explanation_quality: Some(ExplanationQuality::Poor),
    },
    Trial {
        id: "FN_Poor_2",
        description: "Factory vibration sensors stay 15% above the safety line and show sudden spikes.",
        ai_decision: "The AI predicts the machine is normal (negative).",
        ground_truth: "The bearing is failing (false negative).",
        error_type: ErrorType::FalseNegative,
        explanation: "The model thought the vibration wasn’t too high, so it kept the normal label.",
        explanation_quality: Some(ExplanationQuality::Poor),
    },
    Trial {
        id: "FN_Poor_3",
        description: "An email security system spots an executable attachment from an unfamiliar sender.",
        ai_decision: "The AI labels the email as safe (negative).",
        ground_truth: "The email contains malware (false negative).",
        error_type: ErrorType::FalseNegative,
        explanation: "The system skipped deeper analysis and concluded the message was harmless.",
        explanation_quality: Some(ExplanationQuality::Poor),
    },
    Trial {
        id: "FN_Poor_4",
        description: "A bank account records purchases in three cities within half an hour.",
        ai_decision: "The AI marks the account as normal (negative).",
        ground_truth: "The account was compromised (false negative).",
        error_type: ErrorType::FalseNegative,
        explanation: "The model didn’t detect a strong pattern, so it allowed the activity.",
        explanation_quality: Some(ExplanationQuality::Poor),
    },
    Trial {
        id: "FN_Poor_5",
        description: "A roadway monitoring system receives several driver reports about severe flooding on the same street.",
        ai_decision: "The AI reports normal road conditions (negative).",
        ground_truth: "The street is impassable (false negative).",
        error_type: ErrorType::FalseNegative,
        explanation: "Because it didn’t see major data changes, the system kept the road marked as clear.",
        explanation_quality: Some(ExplanationQuality::Poor),
    },
    Trial {
        id: "FN_Poor_6",
        description: "A corporate security platform logs two failed logins from unusual regions.",
        ai_decision: "The AI says the account is safe (negative).",
        ground_truth: "The account was taken over (false negative).",
        error_type: ErrorType::FalseNegative,
        explanation: "The model felt the number of attempts was too low to matter, so it ignored them.",
        explanation_quality: Some(ExplanationQuality::Poor),
    },
    Trial {
        id: "FN_Poor_7",
        description: "A smart farming system records an overnight temperature drop of 8°C and a sharp humidity increase.",
        ai_decision: "The AI says the crops will not be harmed (negative).",
        ground_truth: "The crops suffer frost damage (false negative).",
        error_type: ErrorType::FalseNegative,
        explanation: "The system thought the change was not extreme enough and took no action.",
        explanation_quality: Some(ExplanationQuality::Poor),
    },
    Trial {
        id: "FN_Poor_8",
        description: "An automated support bot sees three consecutive messages complaining about billing errors.",
        ai_decision: "The AI classifies the interaction as a non-complaint (negative).",
        ground_truth: "The customer is filing a formal complaint (false negative).",
        error_type: ErrorType::FalseNegative,
        explanation: "Because nothing was specifically flagged, the system treated it as a routine inquiry.",
        explanation_quality: Some(ExplanationQuality::Poor),
    },
    // FN / Good
    Trial {
        id: "FN_Good_1",
        description: "A patient in the emergency department has an SpO₂ level of 90%, and the CT scan shows faint shadows under heavy noise.",
        ai_decision: "The AI predicts no pneumonia (negative).",
        ground_truth: "The patient has pneumonia (false negative).",
        error_type: ErrorType::FalseNegative,
        explanation: "The shadow area was below the internal threshold and the scan had low signal-to-noise ratio, so the model kept a negative result.",
        explanation_quality: Some(ExplanationQuality::Good),
    },
    Trial {
        id: "FN_Good_2",
        description: "A customer service bot receives a short message about a billing issue with mild emotional wording.",
        ai_decision: "The AI classifies it as a non-complaint (negative).",
        ground_truth: "The customer is formally complaining (false negative).",
        error_type: ErrorType::FalseNegative,
        explanation: "Phrase length and sentiment scores stayed below the complaint threshold, so it was labeled routine.",
        explanation_quality: Some(ExplanationQuality::Good),
    },
    Trial {
        id: "FN_Good_3",
        description: "A manufacturing line experiences a 5°C rise and mild noise increases, still near the historical boundary.",
        ai_decision: "The AI predicts normal operation (negative).",
        ground_truth: "Internal components are loosening (false negative).",
        error_type: ErrorType::FalseNegative,
        explanation: "Temperature and noise shifts did not cross multiple thresholds simultaneously, so the system kept the normal status.",
        explanation_quality: Some(ExplanationQuality::Good),
    },
    Trial {
        id: "FN_Good_4",
        description: "A cybersecurity monitor detects abnormal traffic spread across many ports with low peaks.",
        ai_decision: "The AI reports no attack (negative).",
        ground_truth: "A low-frequency scanning attack is underway (false negative).",
        error_type: ErrorType::FalseNegative,
        explanation: "Because no single port showed a large spike, the pattern was treated as background noise and ignored.",
        explanation_quality: Some(ExplanationQuality::Good),
    },
    Trial {
        id: "FN_Good_5",
        description: "A clinical decision tool analyzes a patient with chest pain, mild shortness of breath, and a noisy ECG.",
        ai_decision: "The AI predicts no heart attack (negative).",
        ground_truth: "The patient is experiencing a myocardial infarction (false negative).",
        error_type: ErrorType::FalseNegative,
        explanation: "The ST-segment elevation was below the alert threshold and the signal quality was poor, so the risk score remained low.",
        explanation_quality: Some(ExplanationQuality::Good),
    },
    Trial {
        id: "FN_Good_6",
        description: "An environmental monitor records factory emissions slightly above the daily mean.",
        ai_decision: "The AI deems the emissions compliant (negative).",
        ground_truth: "Emissions exceed legal limits (false negative).",
        error_type: ErrorType::FalseNegative,
        explanation: "The readings stayed within the historical fluctuation band, so the system did not label them as violations.",
        explanation_quality: Some(ExplanationQuality::Good),
    },
    Trial {
        id: "FN_Good_7",
        description: "A recommendation engine ignores user safety concerns that appear across several contexts.",
        ai_decision: "The AI states the item is safe to use (negative).",
        ground_truth: "The item has a safety risk (false negative).",
        error_type: ErrorType::FalseNegative,
        explanation: "Positive feedback carried greater weight than isolated warnings, so the risk signals were not reflected in the score.",
        explanation_quality: Some(ExplanationQuality::Good),
    },
    Trial {
        id: "FN_Good_8",
        description: "A smart grid observes city electricity demand rise by 12% for 30 minutes.",
        ai_decision: "The AI labels supply as stable (negative).",
        ground_truth: "Transmission lines are nearing overload (false negative).",
        error_type: ErrorType::FalseNegative,
        explanation: "Based on historical patterns, similar short spikes usually drop within 45 minutes and remained within predicted upper bounds, so no alert fired.",
        explanation_quality: Some(ExplanationQuality::Good),
    },
];
