use std::{cell::RefCell, collections::VecDeque};

use async_trait::async_trait;
use talkback_client::{api::UserUpdate, Dialogs, InactivityChoice, PseudonymDialog};

/// Dialogs answered from a script
///
/// An unscripted pseudonym form is closed, an unscripted inactivity message
/// is dismissed.
#[derive(Default)]
pub struct ScriptedDialogs {
    pseudonym_answers: RefCell<VecDeque<Option<UserUpdate>>>,
    inactivity_answers: RefCell<VecDeque<InactivityChoice>>,
    pseudonym_prompts: RefCell<Vec<(PseudonymDialog, Option<String>)>>,
    inactivity_prompts: RefCell<usize>,
    messages: RefCell<Vec<(String, String)>>,
}

impl ScriptedDialogs {
    pub fn new() -> ScriptedDialogs {
        ScriptedDialogs::default()
    }

    /// Next answer to the pseudonym form, None closes it
    pub fn push_pseudonym(&self, pseudonym: Option<&str>) {
        self.pseudonym_answers
            .borrow_mut()
            .push_back(pseudonym.map(|p| UserUpdate::pseudonym(String::from(p))));
    }

    pub fn push_inactivity_choice(&self, choice: InactivityChoice) {
        self.inactivity_answers.borrow_mut().push_back(choice);
    }

    /// Every pseudonym form shown, with the error it displayed
    pub fn test_pseudonym_prompts(&self) -> Vec<(PseudonymDialog, Option<String>)> {
        self.pseudonym_prompts.borrow().clone()
    }

    pub fn test_num_inactivity_prompts(&self) -> usize {
        *self.inactivity_prompts.borrow()
    }

    pub fn test_messages(&self) -> Vec<(String, String)> {
        self.messages.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Dialogs for ScriptedDialogs {
    async fn pseudonym_form(
        &self,
        dialog: &PseudonymDialog,
        error: Option<&str>,
    ) -> Option<UserUpdate> {
        self.pseudonym_prompts
            .borrow_mut()
            .push((dialog.clone(), error.map(String::from)));
        self.pseudonym_answers.borrow_mut().pop_front().flatten()
    }

    async fn inactivity_message(&self) -> InactivityChoice {
        *self.inactivity_prompts.borrow_mut() += 1;
        self.inactivity_answers
            .borrow_mut()
            .pop_front()
            .unwrap_or(InactivityChoice::Dismissed)
    }

    async fn show_message(&self, title: &str, body: &str) {
        self.messages
            .borrow_mut()
            .push((String::from(title), String::from(body)));
    }
}
