// tests/common/mod.rs

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use scoreboard::{
    error::ScoreboardError,
    models::{
        question::{Question, QuestionKind, QuestionRow},
        quiz::{Attempt, Group, QuestionAttempt, QuizContext, Slot, Step, StepDatum, StepState},
    },
    scoring::{
        grader::{AnswerKey, ExactMatchGrader, Grade, Grader, MultiPartGrader},
        response::Response,
    },
    store::AttemptStore,
};

pub const QUIZ_ID: i64 = 5;
pub const CONTEXT_ID: i64 = 50;

#[derive(Default)]
struct Data {
    slots: Vec<(Slot, String)>,
    attempts: Vec<Attempt>,
    question_attempts: HashMap<i64, Vec<QuestionAttempt>>,
    steps: HashMap<i64, Vec<Step>>,
    step_data: HashMap<i64, Vec<StepDatum>>,
    questions: HashMap<i64, Question>,
    broken: HashSet<i64>,
    groups: Vec<Group>,
    members: HashMap<i64, Vec<i64>>,
    names: HashMap<i64, String>,
    next_id: i64,
    clock: i64,
}

/// Attempt store kept in memory, seeded by each test.
pub struct MemoryStore {
    group_mode: bool,
    data: Mutex<Data>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_group_mode(false)
    }

    pub fn with_group_mode(group_mode: bool) -> Self {
        Self {
            group_mode,
            data: Mutex::new(Data {
                next_id: 100,
                clock: 1_700_000_000,
                ..Data::default()
            }),
            unavailable: AtomicBool::new(false),
        }
    }

    fn next_id(data: &mut Data) -> i64 {
        data.next_id += 1;
        data.next_id
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), ScoreboardError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ScoreboardError::StoreUnavailable("connection refused".to_string()));
        }
        Ok(())
    }

    pub fn add_slot(&self, question: Question, slot: i32, max_mark: f64) {
        let mut data = self.data.lock().unwrap();
        let qtype = question.qtype.clone();
        data.slots.push((
            Slot {
                question_id: question.id,
                slot,
                max_mark,
            },
            qtype,
        ));
        data.questions.insert(question.id, question);
    }

    /// A slot whose question fails to load with malformed data.
    pub fn add_broken_slot(&self, question_id: i64, slot: i32, max_mark: f64) {
        let mut data = self.data.lock().unwrap();
        data.slots.push((
            Slot {
                question_id,
                slot,
                max_mark,
            },
            "numerical".to_string(),
        ));
        data.broken.insert(question_id);
    }

    pub fn add_user(&self, user_id: i64, name: &str) {
        self.data.lock().unwrap().names.insert(user_id, name.to_string());
    }

    /// Starts an attempt and returns its question usage id.
    pub fn add_attempt(&self, user_id: i64) -> i64 {
        let mut data = self.data.lock().unwrap();
        let id = Self::next_id(&mut data);
        let usage_id = Self::next_id(&mut data);
        data.attempts.push(Attempt {
            id,
            user_id,
            usage_id,
        });
        usage_id
    }

    pub fn add_question_attempt(&self, usage_id: i64, slot: i32, question_id: i64) -> i64 {
        let mut data = self.data.lock().unwrap();
        let id = Self::next_id(&mut data);
        data.question_attempts
            .entry(usage_id)
            .or_default()
            .push(QuestionAttempt {
                id,
                slot,
                question_id,
            });
        id
    }

    /// Appends a step with the next sequence number and a later timestamp.
    pub fn add_step(
        &self,
        question_attempt_id: i64,
        state: &str,
        fraction: Option<f64>,
        step_data: &[(&str, &str)],
    ) -> i64 {
        let mut data = self.data.lock().unwrap();
        let id = Self::next_id(&mut data);
        data.clock += 10;
        let timestamp = data.clock;
        let steps = data.steps.entry(question_attempt_id).or_default();
        let sequence = steps.len() as i32;
        steps.push(Step {
            id,
            sequence,
            state: StepState::from(state.to_string()),
            fraction,
            timestamp,
        });
        data.step_data.insert(
            id,
            step_data.iter().map(|(k, v)| StepDatum::new(*k, *v)).collect(),
        );
        id
    }

    /// One student answer: a todo step followed by a complete step.
    pub fn answer(&self, usage_id: i64, slot: i32, question_id: i64, answer: &str) -> i64 {
        let qa = self.add_question_attempt(usage_id, slot, question_id);
        self.add_step(qa, "todo", None, &[]);
        self.add_step(qa, "complete", None, &[("answer", answer)]);
        qa
    }

    pub fn add_group(&self, group_id: i64, name: &str, members: &[i64]) {
        let mut data = self.data.lock().unwrap();
        data.groups.push(Group {
            id: group_id,
            name: name.to_string(),
        });
        data.members.insert(group_id, members.to_vec());
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn quiz_context(&self, quiz_id: i64) -> Result<Option<QuizContext>, ScoreboardError> {
        self.check()?;
        Ok((quiz_id == QUIZ_ID).then(|| QuizContext {
            quiz_id,
            context_id: CONTEXT_ID,
            name: "Friday contest".to_string(),
            group_mode: self.group_mode,
        }))
    }

    async fn list_attempts(&self, quiz_id: i64) -> Result<Vec<Attempt>, ScoreboardError> {
        self.check()?;
        if quiz_id != QUIZ_ID {
            return Ok(Vec::new());
        }
        Ok(self.data.lock().unwrap().attempts.clone())
    }

    async fn list_question_attempts(&self, usage_id: i64) -> Result<Vec<QuestionAttempt>, ScoreboardError> {
        self.check()?;
        Ok(self
            .data
            .lock()
            .unwrap()
            .question_attempts
            .get(&usage_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_steps(&self, question_attempt_id: i64) -> Result<Vec<Step>, ScoreboardError> {
        self.check()?;
        Ok(self
            .data
            .lock()
            .unwrap()
            .steps
            .get(&question_attempt_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_step_data(&self, step_id: i64) -> Result<Vec<StepDatum>, ScoreboardError> {
        self.check()?;
        Ok(self
            .data
            .lock()
            .unwrap()
            .step_data
            .get(&step_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_question(&self, question_id: i64) -> Result<Option<Question>, ScoreboardError> {
        self.check()?;
        let data = self.data.lock().unwrap();
        if data.broken.contains(&question_id) {
            return Err(ScoreboardError::MalformedResponse(format!(
                "question {} has an unreadable answer key",
                question_id
            )));
        }
        Ok(data.questions.get(&question_id).cloned())
    }

    async fn get_slots(&self, quiz_id: i64) -> Result<Vec<Slot>, ScoreboardError> {
        self.check()?;
        if quiz_id != QUIZ_ID {
            return Ok(Vec::new());
        }
        let mut slots: Vec<Slot> = self
            .data
            .lock()
            .unwrap()
            .slots
            .iter()
            .filter(|(_, qtype)| qtype != "description")
            .map(|(slot, _)| slot.clone())
            .collect();
        slots.sort_by_key(|s| s.slot);
        Ok(slots)
    }

    async fn list_groups(&self, _quiz_id: i64) -> Result<Vec<Group>, ScoreboardError> {
        self.check()?;
        Ok(self.data.lock().unwrap().groups.clone())
    }

    async fn group_members(&self, group_id: i64) -> Result<Vec<i64>, ScoreboardError> {
        self.check()?;
        Ok(self
            .data
            .lock()
            .unwrap()
            .members
            .get(&group_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn display_name(&self, user_id: i64) -> Result<Option<String>, ScoreboardError> {
        self.check()?;
        Ok(self.data.lock().unwrap().names.get(&user_id).cloned())
    }

    async fn max_step_timestamp(&self, context_id: i64) -> Result<Option<i64>, ScoreboardError> {
        self.check()?;
        if context_id != CONTEXT_ID {
            return Ok(None);
        }
        Ok(self
            .data
            .lock()
            .unwrap()
            .steps
            .values()
            .flatten()
            .map(|s| s.timestamp)
            .max())
    }
}

fn row(id: i64, qtype: &str, name: &str) -> QuestionRow {
    QuestionRow {
        id,
        qtype: qtype.to_string(),
        name: name.to_string(),
        default_mark: 1.0,
    }
}

pub fn shortanswer(id: i64, name: &str, answers: &[(&str, f64)]) -> Question {
    let keys: Vec<AnswerKey> = answers.iter().map(|(a, f)| AnswerKey::new(*a, *f)).collect();
    let grader = ExactMatchGrader::new(&keys, false).unwrap();
    Question::new(row(id, "shortanswer", name), QuestionKind::Gradable(Arc::new(grader)))
}

pub fn cloze(id: i64, name: &str, parts: &[&str]) -> Question {
    let graders: Vec<Arc<dyn Grader>> = parts
        .iter()
        .map(|answer| {
            Arc::new(ExactMatchGrader::new(&[AnswerKey::new(*answer, 1.0)], true).unwrap())
                as Arc<dyn Grader>
        })
        .collect();
    Question::new(
        row(id, "multianswer", name),
        QuestionKind::Gradable(Arc::new(MultiPartGrader::new(graders))),
    )
}

pub fn essay(id: i64, name: &str) -> Question {
    Question::new(row(id, "essay", name), QuestionKind::UngradableManual)
}

pub fn description(id: i64) -> Question {
    Question::new(row(id, "description", "Read this first"), QuestionKind::UngradableExternal)
}

pub fn with_grader(id: i64, qtype: &str, grader: Arc<dyn Grader>) -> Question {
    Question::new(row(id, qtype, "Instrumented"), QuestionKind::Gradable(grader))
}

/// Grader that replays a scripted list of fractions and remembers what it saw.
#[derive(Debug, Default)]
pub struct ScriptedGrader {
    fractions: Vec<f64>,
    parts: Option<usize>,
    calls: AtomicUsize,
    pub seen: Mutex<Vec<Response>>,
}

impl ScriptedGrader {
    pub fn new(fractions: &[f64]) -> Self {
        Self {
            fractions: fractions.to_vec(),
            ..Self::default()
        }
    }

    /// Multi-part variant that grades each part 1.0 when answered with "ok".
    pub fn multipart(parts: usize) -> Self {
        Self {
            parts: Some(parts),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Grader for ScriptedGrader {
    fn grade(&self, response: &Response) -> Result<Grade, ScoreboardError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(response.clone());

        if let (Some(count), Response::Composite(answers)) = (self.parts, response) {
            let mut grade = Grade::default();
            for (index, value) in answers {
                grade.parts.insert(*index, if value == "ok" { 1.0 } else { 0.0 });
            }
            grade.fraction = grade.parts.values().sum::<f64>() / count as f64;
            return Ok(grade);
        }

        let fraction = self.fractions.get(call).copied().unwrap_or(0.0);
        Ok(Grade::whole(fraction))
    }

    fn part_count(&self) -> Option<usize> {
        self.parts
    }
}
