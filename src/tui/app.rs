use ratatui::widgets::TableState;
use tokio::sync::watch;

use crate::binder::{TaskListBinder, TaskListView, TaskStats};
use crate::commands::today;
use crate::error::TodoError;
use crate::live::PushStatus;
use crate::models::{Priority, Task};
use crate::viewmodel::{Notice, TodoViewModel};

#[derive(PartialEq)]
pub enum InputMode {
    Normal,
    Editing,
    Adding,
}

#[derive(Clone, Copy, PartialEq)]
pub enum InputField {
    Title,
    Description,
    Date,
    Priority,
    Category,
}

impl InputField {
    /// Field name as used in validation errors.
    pub fn name(&self) -> &'static str {
        match self {
            InputField::Title => "title",
            InputField::Description => "description",
            InputField::Date => "date",
            InputField::Priority => "priority",
            InputField::Category => "category",
        }
    }
}

/// Order of the "Add Todo" wizard.
pub const ADD_STEPS: [InputField; 5] =
    [InputField::Title, InputField::Description, InputField::Date, InputField::Priority, InputField::Category];

/// The task table: whatever the live query delivered last.
#[derive(Default)]
pub struct TaskList {
    pub tasks: Vec<Task>,
    pub stats: TaskStats,
    pub loading: bool,
    pub show_completed: bool,
    pub state: TableState,
}

impl TaskList {
    /// Rows currently on screen.
    pub fn visible(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|t| self.show_completed || !t.completed).collect()
    }

    pub fn selected(&self) -> Option<&Task> {
        self.state.selected().and_then(|i| self.visible().get(i).copied())
    }

    fn clamp_selection(&mut self) {
        let len = self.visible().len();
        if len == 0 {
            self.state.select(None);
        } else if let Some(i) = self.state.selected() {
            if i >= len {
                self.state.select(Some(len - 1));
            }
        } else {
            self.state.select(Some(0));
        }
    }
}

impl TaskListView for TaskList {
    fn show(&mut self, tasks: &[Task], stats: TaskStats) {
        self.tasks = tasks.to_vec();
        self.stats = stats;
        self.loading = false;
        self.clamp_selection();
    }

    fn loading(&mut self) {
        self.tasks.clear();
        self.stats = TaskStats::default();
        self.loading = true;
        self.clamp_selection();
    }
}

/// State for the multi-step "Add Todo" wizard.
#[derive(Default)]
pub struct AddState {
    pub title: String,
    pub description: String,
    pub date: String,
    pub priority: Priority,
    pub category: String,
    pub step: usize,
}

pub struct App {
    pub vm: TodoViewModel,
    pub list: TaskListBinder<TaskList>,
    pub notices: watch::Receiver<Notice>,
    pub status: watch::Receiver<PushStatus>,
    pub notice: Notice,
    pub user_label: String,
    pub input_mode: InputMode,
    pub input_field: InputField,
    pub input_buffer: String,
    /// Error shown next to the field being edited.
    pub field_error: Option<String>,
    pub target_id: Option<String>,
    pub add_state: AddState,
}

impl App {
    /// Creates the screen and subscribes to the signed-in user's todos.
    pub fn new(mut vm: TodoViewModel, user_label: String) -> App {
        let notices = vm.notices();
        // A failed attach is reported through the notice slot.
        let _ = vm.attach();
        let list = TaskListBinder::new(vm.tasks(), TaskList::default());
        let status = vm.push_status();
        let notice = notices.borrow().clone();
        App {
            vm,
            list,
            notices,
            status,
            notice,
            user_label,
            input_mode: InputMode::Normal,
            input_field: InputField::Title,
            input_buffer: String::new(),
            field_error: None,
            target_id: None,
            add_state: AddState::default(),
        }
    }

    /// Pulls anything the background subscription delivered since the last frame.
    pub fn tick(&mut self) {
        self.list.sync();
        if self.notices.has_changed().unwrap_or(false) {
            self.notice = self.notices.borrow_and_update().clone();
        }
    }

    pub fn tasks(&self) -> &TaskList {
        self.list.view()
    }

    pub fn next(&mut self) {
        let len = self.tasks().visible().len();
        if len == 0 { return; }
        let state = &mut self.list.view_mut().state;
        let i = match state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.tasks().visible().len();
        if len == 0 { return; }
        let state = &mut self.list.view_mut().state;
        let i = match state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        state.select(Some(i));
    }

    fn selected_id(&self) -> Option<(String, bool)> {
        self.tasks().selected().and_then(|t| t.id.clone().map(|id| (id, t.completed)))
    }

    /// Flips the selected task's completion flag, showing it straight away.
    /// A rejected toggle is rolled back, since the store sends no push for it.
    pub async fn toggle_selected(&mut self) {
        let Some((id, completed)) = self.selected_id() else { return };
        self.list.mark_completed(&id, !completed);
        self.list.view_mut().clamp_selection();
        if self.vm.toggle(&id, !completed).await.is_err() {
            self.list.mark_completed(&id, completed);
            self.list.view_mut().clamp_selection();
        }
    }

    pub async fn delete_selected(&mut self) {
        let Some((id, _)) = self.selected_id() else { return };
        let _ = self.vm.delete(&id).await;
    }

    /// Toggles the visibility of completed tasks.
    pub fn toggle_completed(&mut self) {
        let list = self.list.view_mut();
        list.show_completed = !list.show_completed;
        list.clamp_selection();
    }

    pub fn refresh(&mut self) {
        self.vm.clear_notice();
        self.vm.refresh();
    }

    /// Initiates the "Add Todo" wizard.
    pub fn start_add(&mut self) {
        self.input_mode = InputMode::Adding;
        self.add_state = AddState::default();
        self.input_field = ADD_STEPS[0];
        self.input_buffer.clear();
        self.field_error = None;
    }

    /// Initiates editing of a specific field for the selected task.
    pub fn start_edit(&mut self, field: InputField) {
        let Some(t) = self.tasks().selected() else { return };
        let buffer = match field {
            InputField::Title => t.title.clone(),
            InputField::Description => t.description.clone(),
            InputField::Date => t.date.clone(),
            InputField::Priority => t.priority.to_string(),
            InputField::Category => t.category.clone(),
        };
        self.target_id = t.id.clone();
        self.input_mode = InputMode::Editing;
        self.input_field = field;
        self.input_buffer = buffer;
        self.field_error = None;
    }

    pub fn cancel_input(&mut self) {
        self.input_mode = InputMode::Normal;
        self.input_buffer.clear();
        self.field_error = None;
    }

    /// Handles text input based on the current mode.
    pub async fn handle_input(&mut self) {
        match self.input_mode {
            InputMode::Adding => self.handle_adding_input().await,
            InputMode::Editing => self.handle_editing_input().await,
            InputMode::Normal => {}
        }
    }

    fn go_to_step(&mut self, step: usize) {
        self.add_state.step = step;
        self.input_field = ADD_STEPS[step];
        self.input_buffer = match self.input_field {
            InputField::Date => today(),
            _ => String::new(),
        };
    }

    /// Handles input for the "Add Todo" wizard.
    async fn handle_adding_input(&mut self) {
        let value = self.input_buffer.trim().to_string();
        match self.input_field {
            InputField::Title | InputField::Description | InputField::Date if value.is_empty() => {
                self.field_error = Some(format!("{} is required", capitalise(self.input_field.name())));
                return;
            }
            InputField::Title => self.add_state.title = value,
            InputField::Description => self.add_state.description = value,
            InputField::Date => self.add_state.date = value,
            InputField::Priority => {
                if value.is_empty() {
                    self.add_state.priority = Priority::default();
                } else {
                    match value.parse::<Priority>() {
                        Ok(p) => self.add_state.priority = p,
                        Err(e) => {
                            self.field_error = Some(e.to_string());
                            return;
                        }
                    }
                }
            }
            InputField::Category => self.add_state.category = value,
        }
        self.field_error = None;

        if self.add_state.step + 1 < ADD_STEPS.len() {
            self.go_to_step(self.add_state.step + 1);
            return;
        }

        let a = &self.add_state;
        let task = Task::new(a.title.clone(), a.description.clone(), a.date.clone(), String::new())
            .with_priority(a.priority)
            .with_category(a.category.clone());
        match self.vm.add(task).await {
            Err(TodoError::Validation { field, message }) => {
                if let Some(step) = ADD_STEPS.iter().position(|f| f.name() == field) {
                    self.go_to_step(step);
                }
                self.field_error = Some(message);
            }
            _ => self.cancel_input(),
        }
    }

    /// Handles input for the "Edit Todo" mode.
    async fn handle_editing_input(&mut self) {
        let Some(id) = self.target_id.clone() else {
            self.cancel_input();
            return;
        };
        let Some(mut task) = self.list.tasks().iter().find(|t| t.id.as_deref() == Some(id.as_str())).cloned() else {
            self.cancel_input();
            return;
        };
        let value = self.input_buffer.trim().to_string();
        match self.input_field {
            InputField::Title => task.title = value,
            InputField::Description => task.description = value,
            InputField::Date => task.date = value,
            InputField::Category => task = task.with_category(value),
            InputField::Priority => match value.parse::<Priority>() {
                Ok(p) => task.priority = p,
                Err(e) => {
                    self.field_error = Some(e.to_string());
                    return;
                }
            },
        }
        match self.vm.update(task).await {
            Err(TodoError::Validation { message, .. }) => self.field_error = Some(message),
            _ => self.cancel_input(),
        }
    }
}

fn capitalise(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        Some(first) => first.to_uppercase().chain(c).collect(),
        None => String::new(),
    }
}
