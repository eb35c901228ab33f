use std::collections::HashMap;
use std::path::Path;
use futures::channel::mpsc::Sender;
use iced::{Alignment, Application, Command, Element, Length, Settings, Size, Subscription, window};
use iced::event::{self, Event};
use iced::executor;
use iced::theme::{self, Theme};
use iced::widget::{Column, Row, button, column, container, horizontal_rule, row, scrollable, slider, text};
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::config::io::ConfigIO;
use crate::config::types::Config;
use crate::device::permission::PermissionOutcome;
use crate::device::types::{DeviceState, DeviceStatus};
use crate::error::AppRunError;
use crate::gui::style::PadStyleSheet;
use crate::gui::types::Message;
use crate::session::session_subscription;
use crate::session::types::{SessionAction, SessionEvent};
use crate::surface::state::{Control, ControlSurfaceState, PAD_COUNT};

const PADS_PER_ROW: usize = 4;

pub struct ApplicationFlags {
    config_io: ConfigIO,
}

pub struct MyApplication {
    // this token is cancelled upon exit
    app_cancel: CancellationToken,

    // messages that the user must click away
    notices: Vec<String>,

    config_io: ConfigIO,
    // the session starts once the config is loaded
    config: Option<Config>,

    // Send actions to this futures channel to drive the session
    actions: Option<Sender<SessionAction>>,
    session_ended: bool,
    // set once the window asked to close, the window closes after the session ended
    closing: Option<window::Id>,

    // latest state from the session
    device_status: DeviceStatus,
    permission: Option<PermissionOutcome>,
    adapter_error: Option<String>,
    surface: ControlSurfaceState,

    // slider positions while they are being dragged
    drafts: HashMap<Control, f32>,
}

impl MyApplication {
    fn before_close(&mut self) {
        self.app_cancel.cancel();
    }

    fn load_config(&self) -> Command<Message> {
        let config_io = self.config_io.clone();

        let fut = async move {
            match config_io.read().await {
                Ok(config) => (config, None),
                Err(err) => {
                    error!("Failed to load config: {:?}", &err);
                    (Config::default(), Some(format!("Failed to load config, using defaults: {}", &err)))
                },
            }
        };

        Command::perform(fut, Message::ConfigLoadComplete)
    }

    fn send_action(&mut self, action: SessionAction) {
        let Some(sender) = self.actions.as_mut() else {
            warn!("Session is not ready, dropping {:?}", action);
            return;
        };

        if let Err(err) = sender.try_send(action) {
            warn!("Failed to send action to session: {}", err);
        }
    }

    fn status_text(&self) -> String {
        if let Some(err) = &self.adapter_error {
            return format!("Bluetooth is not available: {}", err);
        }

        let status = &self.device_status;
        match status.state {
            DeviceState::Idle if self.permission == Some(PermissionOutcome::Denied) => "Not allowed to access Bluetooth!".to_string(),
            DeviceState::Idle => "Not connected".to_string(),
            DeviceState::Scanning => "Scanning…".to_string(),
            DeviceState::Connecting => "Connecting…".to_string(),
            DeviceState::Connected => {
                let name = status.device.as_ref().map(|device| device.display_name()).unwrap_or("NONE");
                if status.is_connected {
                    format!("Connected to {}", name)
                } else {
                    format!("Checking connection to {}…", name)
                }
            },
            DeviceState::Disconnecting => "Disconnecting…".to_string(),
        }
    }

    fn slider_value(&self, control: Control) -> f32 {
        self.drafts.get(&control).copied().unwrap_or_else(|| self.surface.value(control))
    }

    fn control_view(&self, control: Control) -> Element<Message> {
        let range = self.surface.range(control);
        let step = if control.is_normalized() { 0.01 } else { 1.0 };

        let slider = slider(range.clone(), self.slider_value(control), move |value| Message::SliderChanged(control, value))
            .step(step)
            .on_release(Message::SliderReleased(control));

        let mut content = Column::new()
            .push(text(control.label()))
            .push(slider)
            .spacing(4);

        if !control.is_normalized() {
            // whole number sliders get a scale below them
            let (start, end) = (*range.start() as u32, *range.end() as u32);
            let scale = Row::with_children((start..=end).map(|value| {
                text(value.to_string()).size(10).width(Length::Fill).into()
            }));
            content = content.push(scale);
        }

        content.into()
    }

    fn pads_view(&self) -> Element<Message> {
        let notes = self.surface.note_states();

        let rows = (0..PAD_COUNT).step_by(PADS_PER_ROW).map(|first| {
            Row::with_children((first..first + PADS_PER_ROW).map(|pad| {
                button(text(self.surface.pad_label(pad).to_string()))
                    .width(50)
                    .height(50)
                    .style(theme::Button::Custom(Box::new(PadStyleSheet { on: notes[pad] })))
                    .on_press(Message::PadPressed(pad))
                    .into()
            }))
            .spacing(10)
            .into()
        });

        Column::with_children(rows)
            .spacing(10)
            .align_items(Alignment::Center)
            .into()
    }
}

impl Application for MyApplication {
    type Executor = executor::Default;
    type Message = Message;
    type Theme = Theme;
    type Flags = ApplicationFlags;

    fn new(flags: ApplicationFlags) -> (MyApplication, Command<Self::Message>) {
        let app = MyApplication {
            app_cancel: CancellationToken::new(),
            notices: Vec::new(),
            config_io: flags.config_io,
            config: None,
            actions: None,
            session_ended: false,
            closing: None,
            device_status: DeviceStatus::default(),
            permission: None,
            adapter_error: None,
            surface: ControlSurfaceState::default(),
            drafts: HashMap::new(),
        };

        let command = app.load_config();
        (app, command)
    }

    fn title(&self) -> String {
        String::from(concat!("MIDI Pad Remote ", env!("CARGO_PKG_VERSION")))
    }

    fn update(&mut self, message: Message) -> Command<Self::Message> {
        match message {
            Message::ConfigLoadComplete((config, error_message)) => {
                info!("Config load complete");
                self.config = Some(config);
                if let Some(error_message) = error_message {
                    self.notices.push(error_message);
                }
            },
            Message::NoticeConfirmed => {
                if !self.notices.is_empty() {
                    self.notices.remove(0);
                }
            },
            Message::EventOccurred(Event::Window(id, window::Event::CloseRequested)) => {
                info!("Close requested");
                self.before_close();

                // without a running session there is nothing to wait for
                if self.session_ended || self.actions.is_none() {
                    return window::close(id);
                }
                self.closing = Some(id);
            },
            Message::EventOccurred(_) => {},
            Message::Session(event) => match event {
                SessionEvent::Ready(sender) => {
                    self.actions = Some(sender);
                },
                SessionEvent::AdapterUnavailable(err) => {
                    self.adapter_error = Some(err);
                },
                SessionEvent::Permissions(outcome) => {
                    self.permission = Some(outcome);
                },
                SessionEvent::Device(status) => {
                    self.device_status = status;
                },
                SessionEvent::Surface(surface) => {
                    self.surface = surface;
                },
                SessionEvent::Transmitted(_) => {},
                SessionEvent::Ended => {
                    info!("Session ended");
                    self.session_ended = true;
                    self.actions = None;

                    if let Some(id) = self.closing.take() {
                        return window::close(id);
                    }
                },
            },
            Message::ConnectPressed => {
                self.send_action(SessionAction::ToggleConnection);
            },
            Message::PadPressed(pad) => {
                self.send_action(SessionAction::TogglePad(pad));
            },
            Message::SliderChanged(control, value) => {
                self.drafts.insert(control, value);
                if control.applies_while_dragging() {
                    self.send_action(SessionAction::SetControl(control, value));
                }
            },
            Message::SliderReleased(control) => {
                if let Some(value) = self.drafts.remove(&control) {
                    if !control.applies_while_dragging() {
                        self.send_action(SessionAction::SetControl(control, value));
                    }
                }
            },
            Message::AdvanceBankPressed => {
                self.send_action(SessionAction::AdvanceBank);
            },
        }

        Command::none()
    }

    fn subscription(&self) -> Subscription<Message> {
        let mut subscriptions = vec![event::listen().map(Message::EventOccurred)];

        if let Some(config) = &self.config {
            subscriptions.push(
                session_subscription(config.session_settings(), self.app_cancel.clone()).map(Message::Session)
            );
        }

        Subscription::batch(subscriptions)
    }

    fn view(&self) -> Element<Message> {
        if let Some(notice) = self.notices.first() {
            return container(
                column![
                    text(notice),

                    button(text("Okay"))
                        .on_press(Message::NoticeConfirmed),

                ].align_items(Alignment::Center).spacing(20),
            )
            .width(Length::Fill)
            .padding(20)
            .into()
        }

        let connect_label = if self.device_status.state == DeviceState::Connected { "Disconnect" } else { "Connect" };

        let controls = Column::with_children(Control::ALL.iter().map(|control| self.control_view(*control)))
            .spacing(16)
            .width(Length::Fill);

        container(
            column![
                button(text(connect_label))
                    .width(Length::Fill)
                    .on_press(Message::ConnectPressed),

                text(self.status_text()),

                horizontal_rule(10),

                scrollable(
                    column![
                        text("MIDI Controller").size(34),

                        self.pads_view(),

                        controls,

                        row![
                            text(format!("Bank {}", self.surface.bank_offset())),
                            button(text("Increase Values"))
                                .on_press(Message::AdvanceBankPressed),
                        ].align_items(Alignment::Center).spacing(20),
                    ]
                        .spacing(30)
                        .padding(10)
                        .align_items(Alignment::Center)
                ),
            ]
                .spacing(10)
                .align_items(Alignment::Center),
        )
        .width(Length::Fill)
        .height(Length::Fill)
        .padding(20)
        .into()
    }
}

pub fn run_application(config_path: Option<&Path>) -> Result<(), AppRunError> {
    let mut config_io = ConfigIO::new_sync(config_path)?;
    let mut config_locker = config_io.locker()?;
    let _lock_guard = config_locker.lock()?;

    let flags = ApplicationFlags { config_io };
    let mut settings = Settings::with_flags(flags);

    // handle exits ourselves (Event::CloseRequested)
    settings.id = Some("midi-pad-remote".to_string());
    settings.window.exit_on_close_request = false;
    settings.window.size = Size::new(480.0, 900.0);

    // this function will call process::exit() unless there was a startup error
    MyApplication::run(settings)?;
    Ok(())
}
