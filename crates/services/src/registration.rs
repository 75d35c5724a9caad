//! # Registration wizard
//!
//! Two views of the same four-step form:
//!
//! * [`RegistrationWizard`] keeps the raw form, the current step and the
//!   per-field error map the way an interactive form does.
//! * The typed states ([`PersonalInfoStep`] .. [`CompletedRegistration`]) can
//!   only be reached by passing each step's checks, so a
//!   `CompletedRegistration` always holds validated data.

use std::collections::BTreeMap;

use domains::{
    CourseId, CourseSelection, DomainError, EducationInfo, FormField, PaymentChoice,
    PersonalInfo, RegistrationFormData,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WizardStep {
    PersonalInfo,
    Education,
    CourseSelection,
    Payment,
}

impl WizardStep {
    pub const ALL: [WizardStep; 4] = [
        WizardStep::PersonalInfo,
        WizardStep::Education,
        WizardStep::CourseSelection,
        WizardStep::Payment,
    ];

    /// 1-based position, as shown in the progress bar.
    pub fn number(self) -> u8 {
        match self {
            Self::PersonalInfo => 1,
            Self::Education => 2,
            Self::CourseSelection => 3,
            Self::Payment => 4,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.get(usize::from(n).checked_sub(1)?).copied()
    }

    pub fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    pub fn previous(self) -> Option<Self> {
        Self::from_number(self.number() - 1)
    }

    /// Fields checked when leaving this step.
    pub fn validated_fields(self) -> &'static [FormField] {
        match self {
            Self::PersonalInfo => &[FormField::FirstName, FormField::LastName, FormField::Email],
            Self::Education => &[FormField::HighestEducation],
            Self::CourseSelection => &[FormField::SelectedCourseId, FormField::LearningGoals],
            Self::Payment => &[FormField::PaymentMethod, FormField::AgreeToTerms],
        }
    }
}

/// Field-keyed validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<FormField, String>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: FormField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: FormField) -> bool {
        self.0.contains_key(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = FormField> + '_ {
        self.0.keys().copied()
    }

    fn insert(&mut self, field: FormField, message: &str) {
        self.0.insert(field, message.to_string());
    }

    fn remove(&mut self, field: FormField) {
        self.0.remove(&field);
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    /// Error map keyed by the camelCase field names used on the wire.
    pub fn to_field_map(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|(field, message)| (field.as_str().to_string(), message.clone()))
            .collect()
    }
}

impl From<ValidationErrors> for DomainError {
    fn from(errors: ValidationErrors) -> Self {
        DomainError::InvalidForm(errors.to_field_map())
    }
}

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Checks only the fields belonging to `step`. Other fields never produce
/// errors here, however incomplete they are.
pub fn validate_step(step: WizardStep, form: &RegistrationFormData) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    match step {
        WizardStep::PersonalInfo => {
            if blank(&form.first_name) {
                errors.insert(FormField::FirstName, "First name is required");
            }
            if blank(&form.last_name) {
                errors.insert(FormField::LastName, "Last name is required");
            }
            if blank(&form.email) {
                errors.insert(FormField::Email, "Email is required");
            } else if !is_valid_email(form.email.trim()) {
                errors.insert(FormField::Email, "Please enter a valid email address");
            }
        }
        WizardStep::Education => {
            if blank(&form.highest_education) {
                errors.insert(FormField::HighestEducation, "Please select your highest education level");
            }
        }
        WizardStep::CourseSelection => {
            if blank(&form.selected_course_id) {
                errors.insert(FormField::SelectedCourseId, "Please select a course");
            }
            if blank(&form.learning_goals) {
                errors.insert(FormField::LearningGoals, "Please describe your learning goals");
            }
        }
        WizardStep::Payment => {
            if blank(&form.payment_method) {
                errors.insert(FormField::PaymentMethod, "Please select a payment method");
            }
            if !form.agree_to_terms {
                errors.insert(FormField::AgreeToTerms, "You must agree to the terms and conditions");
            }
        }
    }
    errors
}

/// A value typed into one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Flag(b)
    }
}

impl FieldValue {
    fn into_text(self) -> String {
        match self {
            FieldValue::Text(s) => s,
            FieldValue::Flag(b) => b.to_string(),
        }
    }

    fn into_flag(self) -> bool {
        match self {
            FieldValue::Flag(b) => b,
            FieldValue::Text(s) => matches!(s.trim(), "true" | "on" | "1" | "yes"),
        }
    }
}

/// Interactive wizard state: where the user is, what they typed and which
/// fields are currently flagged.
#[derive(Debug, Clone)]
pub struct RegistrationWizard {
    step: WizardStep,
    form: RegistrationFormData,
    errors: ValidationErrors,
}

impl Default for RegistrationWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistrationWizard {
    pub fn new() -> Self {
        Self::with_form(RegistrationFormData::default())
    }

    /// Starts at step 1 with a prefilled form (e.g. a course id from the URL).
    pub fn with_form(form: RegistrationFormData) -> Self {
        Self { step: WizardStep::PersonalInfo, form, errors: ValidationErrors::default() }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn form(&self) -> &RegistrationFormData {
        &self.form
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Updates one field and clears that field's error only.
    pub fn set_field(&mut self, field: FormField, value: impl Into<FieldValue>) {
        let value = value.into();
        let form = &mut self.form;
        match field {
            FormField::FirstName => form.first_name = value.into_text(),
            FormField::LastName => form.last_name = value.into_text(),
            FormField::Email => form.email = value.into_text(),
            FormField::Phone => form.phone = value.into_text(),
            FormField::HighestEducation => form.highest_education = value.into_text(),
            FormField::FieldOfStudy => form.field_of_study = value.into_text(),
            FormField::CurrentOccupation => form.current_occupation = value.into_text(),
            FormField::YearsOfExperience => form.years_of_experience = value.into_text(),
            FormField::SelectedCourseId => form.selected_course_id = value.into_text(),
            FormField::LearningGoals => form.learning_goals = value.into_text(),
            FormField::PreferredSchedule => form.preferred_schedule = value.into_text(),
            FormField::PaymentMethod => form.payment_method = value.into_text(),
            FormField::AgreeToTerms => form.agree_to_terms = value.into_flag(),
        }
        self.errors.remove(field);
    }

    /// Validates the current step. On success moves forward (the last step
    /// stays put) and returns the new step; on failure the step is unchanged
    /// and the error map is replaced with this step's errors.
    pub fn next(&mut self) -> Result<WizardStep, ValidationErrors> {
        let errors = validate_step(self.step, &self.form);
        self.errors = errors.clone();
        errors.into_result()?;
        if let Some(next) = self.step.next() {
            self.step = next;
        }
        Ok(self.step)
    }

    /// Moves back one step without validating. No-op on step 1.
    pub fn back(&mut self) -> WizardStep {
        if let Some(previous) = self.step.previous() {
            self.step = previous;
        }
        self.step
    }

    /// Final submission: every step must pass, the current one included.
    /// On failure the wizard jumps to the first failing step.
    pub fn complete(&mut self) -> Result<CompletedRegistration, ValidationErrors> {
        match CompletedRegistration::from_form(&self.form) {
            Ok(done) => {
                self.errors = ValidationErrors::default();
                Ok(done)
            }
            Err((step, errors)) => {
                self.step = step;
                self.errors = errors.clone();
                Err(errors)
            }
        }
    }
}

fn trimmed(s: &str) -> String {
    s.trim().to_string()
}

/// Step 1. Nothing validated yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersonalInfoStep;

impl PersonalInfoStep {
    pub fn advance(&self, form: &RegistrationFormData) -> Result<EducationStep, ValidationErrors> {
        validate_step(WizardStep::PersonalInfo, form).into_result()?;
        Ok(EducationStep {
            personal: PersonalInfo {
                first_name: trimmed(&form.first_name),
                last_name: trimmed(&form.last_name),
                email: trimmed(&form.email),
                phone: trimmed(&form.phone),
            },
        })
    }
}

/// Step 2. Personal info is valid.
#[derive(Debug, Clone)]
pub struct EducationStep {
    pub personal: PersonalInfo,
}

impl EducationStep {
    pub fn advance(&self, form: &RegistrationFormData) -> Result<CourseSelectionStep, ValidationErrors> {
        validate_step(WizardStep::Education, form).into_result()?;
        Ok(CourseSelectionStep {
            personal: self.personal.clone(),
            education: EducationInfo {
                highest_education: trimmed(&form.highest_education),
                field_of_study: trimmed(&form.field_of_study),
                current_occupation: trimmed(&form.current_occupation),
                years_of_experience: trimmed(&form.years_of_experience),
            },
        })
    }

    pub fn back(self) -> PersonalInfoStep {
        PersonalInfoStep
    }
}

/// Step 3.
#[derive(Debug, Clone)]
pub struct CourseSelectionStep {
    pub personal: PersonalInfo,
    pub education: EducationInfo,
}

impl CourseSelectionStep {
    pub fn advance(&self, form: &RegistrationFormData) -> Result<PaymentStep, ValidationErrors> {
        validate_step(WizardStep::CourseSelection, form).into_result()?;
        Ok(PaymentStep {
            personal: self.personal.clone(),
            education: self.education.clone(),
            selection: CourseSelection {
                course_id: CourseId::new(form.selected_course_id.trim()),
                learning_goals: trimmed(&form.learning_goals),
                preferred_schedule: trimmed(&form.preferred_schedule),
            },
        })
    }

    pub fn back(self) -> EducationStep {
        EducationStep { personal: self.personal }
    }
}

/// Step 4.
#[derive(Debug, Clone)]
pub struct PaymentStep {
    pub personal: PersonalInfo,
    pub education: EducationInfo,
    pub selection: CourseSelection,
}

impl PaymentStep {
    pub fn advance(&self, form: &RegistrationFormData) -> Result<CompletedRegistration, ValidationErrors> {
        validate_step(WizardStep::Payment, form).into_result()?;
        Ok(CompletedRegistration {
            personal: self.personal.clone(),
            education: self.education.clone(),
            selection: self.selection.clone(),
            payment: PaymentChoice { payment_method: trimmed(&form.payment_method) },
        })
    }

    pub fn back(self) -> CourseSelectionStep {
        CourseSelectionStep { personal: self.personal, education: self.education }
    }
}

/// A fully validated registration, ready for checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedRegistration {
    pub personal: PersonalInfo,
    pub education: EducationInfo,
    pub selection: CourseSelection,
    pub payment: PaymentChoice,
}

impl CompletedRegistration {
    /// Runs all four steps in order. The error carries the first failing
    /// step and only that step's errors.
    pub fn from_form(form: &RegistrationFormData) -> Result<Self, (WizardStep, ValidationErrors)> {
        let education = PersonalInfoStep
            .advance(form)
            .map_err(|e| (WizardStep::PersonalInfo, e))?;
        let selection = education.advance(form).map_err(|e| (WizardStep::Education, e))?;
        let payment = selection.advance(form).map_err(|e| (WizardStep::CourseSelection, e))?;
        payment.advance(form).map_err(|e| (WizardStep::Payment, e))
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.personal.first_name, self.personal.last_name)
            .trim()
            .to_string()
    }
}
