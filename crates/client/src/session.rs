//! Intake session controller
//!
//! Single owner of the live session: routes server events to the record,
//! transcript, playback and UI, streams caller audio upstream, keeps the
//! recovery snapshot current, and drives reconnection with one active retry
//! timer. All session state lives here; nothing is global.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant as TokioInstant};

use voice_intake_config::constants::audio as audio_wire;
use voice_intake_config::{field_def, FieldGroup, Settings, FIELDS, NOT_NEEDED};
use voice_intake_core::{
    decode_chunk, encode_frame, AudioOutput, ConversationLog, LinkStatus, PlaybackClock, Turn,
    UiSink,
};
use voice_intake_form::{checklist, validate, PatientRecord, RecordStore, ToolCallDedup, UtteranceDedup};
use voice_intake_persistence::{RecoverySnapshot, RecoveryStore};
use voice_intake_transport::{
    ClientMessage, ConnectionManager, LinkEvent, ReconnectPolicy, ServerEvent, ToolCallArgs,
    ERROR_TYPE_QUOTA,
};

use crate::http::IntakeApiClient;
use crate::ClientError;

/// Popup shown when the upstream quota is exhausted
const QUOTA_POPUP: &str =
    "The voice service is temporarily unavailable (quota exceeded). Please try again later.";

/// Popup shown when the reconnect budget runs out
const GAVE_UP_POPUP: &str =
    "Unable to restore the connection. Your progress is saved; please restart the interview.";

/// Drives one intake interview end to end
pub struct SessionController {
    settings: Settings,
    connection: ConnectionManager,
    link_rx: mpsc::UnboundedReceiver<LinkEvent>,
    capture_rx: mpsc::Receiver<Vec<f32>>,
    record: RecordStore,
    conversation: ConversationLog,
    utterance_dedup: UtteranceDedup,
    tool_dedup: ToolCallDedup,
    playback: PlaybackClock,
    ui: Arc<dyn UiSink>,
    audio_out: Arc<dyn AudioOutput>,
    recovery: Arc<dyn RecoveryStore>,
    api: Option<Arc<IntakeApiClient>>,
    instructions: String,
    assistant_partial: String,
    last_updated_field: Option<String>,
    stall_deadline: TokioInstant,
    stall_armed: bool,
    retry_at: Option<TokioInstant>,
    stopping: bool,
}

impl SessionController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: Settings,
        instructions: impl Into<String>,
        capture_rx: mpsc::Receiver<Vec<f32>>,
        ui: Arc<dyn UiSink>,
        audio_out: Arc<dyn AudioOutput>,
        recovery: Arc<dyn RecoveryStore>,
        api: Option<Arc<IntakeApiClient>>,
    ) -> Self {
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let connection = ConnectionManager::new(
            settings.server.ws_url.clone(),
            Duration::from_millis(settings.session.connect_timeout_ms),
            ReconnectPolicy::new(&settings.reconnect),
            link_tx,
        );
        let stall_timeout = Duration::from_millis(settings.session.stall_timeout_ms);
        Self {
            connection,
            link_rx,
            capture_rx,
            record: RecordStore::new(),
            conversation: ConversationLog::new(),
            utterance_dedup: UtteranceDedup::new(Duration::from_millis(
                settings.dedup.utterance_window_ms,
            )),
            tool_dedup: ToolCallDedup::new(Duration::from_millis(
                settings.dedup.tool_call_window_ms,
            )),
            playback: PlaybackClock::new(),
            ui,
            audio_out,
            recovery,
            api,
            instructions: instructions.into(),
            assistant_partial: String::new(),
            last_updated_field: None,
            stall_deadline: TokioInstant::now() + stall_timeout,
            stall_armed: false,
            retry_at: None,
            stopping: false,
            settings,
        }
    }

    fn setup_message(&self) -> ClientMessage {
        ClientMessage::Setup {
            model: self.settings.server.model.clone(),
            voice: self.settings.server.voice.clone(),
            instructions: self.instructions.clone(),
        }
    }

    /// Connect (resuming a recovered session if a fresh snapshot exists)
    /// and run until the interview completes or the link is lost for good
    pub async fn start(&mut self) -> Result<(), ClientError> {
        self.ui.connection_status(LinkStatus::Connecting).await;

        let mut recovered = false;
        match self.recovery.load(self.settings.session.recovery_ttl_secs) {
            Ok(Some(snapshot)) => {
                tracing::info!(
                    turns = snapshot.conversation.len(),
                    "resuming interrupted session"
                );
                self.record.restore(snapshot.record);
                self.conversation = snapshot.conversation;
                self.last_updated_field = snapshot.last_updated_field;
                recovered = true;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("recovery load failed: {e}"),
        }

        self.connection.connect(self.setup_message()).await?;
        self.ui.connection_status(LinkStatus::Connected).await;

        if recovered {
            let replay = replay_message(
                &self.record.snapshot(),
                &self.conversation,
                self.last_updated_field.as_deref(),
            );
            self.send_system(replay);
            let sections = checklist::derive(&self.record.snapshot());
            self.ui.checklist_updated(&sections).await;
        }

        self.arm_stall();
        self.run().await;
        Ok(())
    }

    /// Operator stop: tear the link down and drop the snapshot
    pub fn stop(&mut self) {
        self.stopping = true;
        self.connection.disconnect();
        if let Err(e) = self.recovery.clear() {
            tracing::warn!("failed to clear recovery snapshot: {e}");
        }
    }

    async fn run(&mut self) {
        let mut capture_open = true;
        loop {
            let stall_armed = self.stall_armed;
            let stall_deadline = self.stall_deadline;
            let retry_at = self.retry_at;

            tokio::select! {
                maybe = self.link_rx.recv() => {
                    let Some(event) = maybe else { break };
                    if self.handle_link_event(event).await {
                        break;
                    }
                }
                maybe = self.capture_rx.recv(), if capture_open => {
                    match maybe {
                        Some(frame) => self.handle_capture_frame(&frame),
                        None => capture_open = false,
                    }
                }
                _ = sleep_until(stall_deadline), if stall_armed => {
                    self.stall_armed = false;
                    tracing::info!("conversation stalled, nudging");
                    self.send_system(
                        "The conversation has gone quiet. Gently prompt the patient for the \
                         next piece of information."
                            .to_string(),
                    );
                }
                _ = sleep_until(retry_at.unwrap_or_else(TokioInstant::now)), if retry_at.is_some() => {
                    self.retry_at = None;
                    self.try_reconnect().await;
                }
            }
        }
    }

    /// Returns true when the session loop should exit
    async fn handle_link_event(&mut self, event: LinkEvent) -> bool {
        match event {
            LinkEvent::Inbound(server_event) => {
                // A stop decided here (quota, confirmation) surfaces as the
                // manual Closed event the disconnect emits
                self.handle_server_event(server_event).await;
                false
            }
            LinkEvent::Closed { manual: true } => {
                self.ui.connection_status(LinkStatus::Disconnected).await;
                self.stopping
            }
            LinkEvent::Closed { manual: false } => {
                self.playback.reset();
                self.audio_out.stop().await;
                self.schedule_retry().await
            }
        }
    }

    /// Returns true when reconnection has been abandoned
    async fn schedule_retry(&mut self) -> bool {
        match self.connection.next_retry_delay() {
            Some(delay) => {
                self.ui.connection_status(LinkStatus::Reconnecting).await;
                self.retry_at = Some(TokioInstant::now() + delay);
                false
            }
            None => {
                self.ui.connection_status(LinkStatus::Failed).await;
                self.ui.popup(GAVE_UP_POPUP).await;
                true
            }
        }
    }

    async fn try_reconnect(&mut self) {
        match self.connection.connect(self.setup_message()).await {
            Ok(()) => {
                tracing::info!("reconnected");
                self.tool_dedup.clear();
                self.ui.connection_status(LinkStatus::Connected).await;
                let replay = replay_message(
                    &self.record.snapshot(),
                    &self.conversation,
                    self.last_updated_field.as_deref(),
                );
                self.send_system(replay);
                self.arm_stall();
            }
            Err(e) => {
                tracing::warn!("reconnect attempt failed: {e}");
                // Loop exit happens via the next link event; an abandoned
                // retry is surfaced immediately
                if self.schedule_retry().await {
                    self.stopping = true;
                    self.connection.disconnect();
                }
            }
        }
    }

    fn handle_capture_frame(&mut self, samples: &[f32]) {
        use voice_intake_transport::ConnectionState;
        if self.connection.state() != ConnectionState::Connected {
            return;
        }
        match encode_frame(
            samples,
            self.settings.audio.capture_rate,
            self.settings.audio.wire_rate,
        ) {
            Ok(data) => {
                let msg = ClientMessage::Audio {
                    data,
                    mime_type: audio_wire::WIRE_MIME.to_string(),
                };
                if let Err(e) = self.connection.send(msg) {
                    tracing::warn!("dropping capture frame: {e}");
                }
            }
            Err(e) => tracing::debug!("skipping capture frame: {e}"),
        }
    }

    async fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Audio { data, mime_type } => {
                let mime = mime_type.as_deref().unwrap_or("audio/pcm");
                match decode_chunk(&data, mime) {
                    Ok(chunk) => {
                        let start = self.playback.schedule(Instant::now(), chunk.duration);
                        self.audio_out.play(chunk, start).await;
                    }
                    // Cursor untouched: the next good chunk schedules as if
                    // this one never arrived
                    Err(e) => tracing::warn!("undecodable audio chunk: {e}"),
                }
                self.arm_stall();
            }
            ServerEvent::OutputAudioStarted => {
                self.ui.speaking_indicator(true).await;
            }
            ServerEvent::OutputAudioStopped => {
                self.ui.speaking_indicator(false).await;
            }
            ServerEvent::Text { text } => {
                self.push_assistant_turn(text).await;
                self.arm_stall();
            }
            ServerEvent::TextDelta { delta } | ServerEvent::AudioTranscriptDelta { delta } => {
                self.assistant_partial.push_str(&delta);
                self.arm_stall();
            }
            ServerEvent::TextDone { text } => {
                let content = text.unwrap_or_else(|| std::mem::take(&mut self.assistant_partial));
                self.assistant_partial.clear();
                self.push_assistant_turn(content).await;
                self.arm_stall();
            }
            ServerEvent::AudioTranscriptDone { transcript } => {
                let content =
                    transcript.unwrap_or_else(|| std::mem::take(&mut self.assistant_partial));
                self.assistant_partial.clear();
                self.push_assistant_turn(content).await;
                self.arm_stall();
            }
            ServerEvent::InputTranscription { transcript } => {
                self.handle_user_transcript(transcript).await;
                self.arm_stall();
            }
            ServerEvent::TurnComplete => {
                self.tool_dedup.clear();
                self.arm_stall();
            }
            ServerEvent::FunctionCallArgumentsDone { arguments } => {
                self.handle_tool_call(&arguments).await;
                self.arm_stall();
            }
            ServerEvent::Error {
                message,
                error_type,
            } => {
                if error_type.as_deref() == Some(ERROR_TYPE_QUOTA) {
                    tracing::error!("quota exhausted: {message}");
                    self.ui.popup(QUOTA_POPUP).await;
                    self.stopping = true;
                    self.connection.disconnect();
                } else {
                    tracing::warn!(?error_type, "upstream error: {message}");
                }
            }
            ServerEvent::FunctionCallStart { name } => {
                tracing::debug!(?name, "tool call started");
            }
            ServerEvent::FunctionCallDone
            | ServerEvent::ResponseCreated
            | ServerEvent::ResponseDone => {}
            ServerEvent::SystemMessage { content } => {
                tracing::debug!("system message echoed: {content}");
            }
            ServerEvent::Unknown => {
                tracing::debug!("ignoring unknown server event");
            }
        }
    }

    async fn handle_user_transcript(&mut self, transcript: String) {
        if !self.utterance_dedup.check(&transcript, Instant::now()) {
            tracing::debug!("suppressed duplicate utterance");
            return;
        }
        if !is_meaningful_utterance(&transcript) {
            self.send_system(
                "The caller's last response was unclear. Politely ask them to repeat it."
                    .to_string(),
            );
            return;
        }
        let turn = Turn::user(transcript);
        self.ui.transcript(&turn).await;
        self.conversation.push(turn);
        self.persist_snapshot();
    }

    async fn push_assistant_turn(&mut self, content: String) {
        if content.trim().is_empty() {
            return;
        }
        let turn = Turn::assistant(content);
        self.ui.transcript(&turn).await;
        self.conversation.push(turn);
        self.persist_snapshot();
    }

    async fn handle_tool_call(&mut self, arguments: &str) {
        let args = match ToolCallArgs::parse(arguments) {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!("malformed tool call arguments: {e}");
                self.send_system(
                    "ERROR: Invalid function call format. Please retry with proper arguments."
                        .to_string(),
                );
                return;
            }
        };
        let value = args.value_text();
        if !self.tool_dedup.check(&args.field_name, &value, Instant::now()) {
            tracing::debug!(field = %args.field_name, "suppressed duplicate tool call");
            return;
        }

        let snapshot = self.record.snapshot();
        match validate(&args.field_name, &value, &snapshot) {
            Ok(accepted) => {
                // validate resolved the name, so the lookup cannot miss
                let Some(def) = field_def(args.field_name.trim().to_lowercase().as_str()) else {
                    return;
                };
                let changes = self.record.apply(def.name, accepted);
                for change in &changes {
                    tracing::info!(field = change.field, "field saved");
                    self.ui.field_saved(change.field, &change.value).await;
                }
                let updated = self.record.snapshot();
                self.ui.checklist_updated(&checklist::derive(&updated)).await;
                self.last_updated_field = Some(def.name.to_string());
                self.persist_snapshot();

                if def.name == "confirmation" {
                    self.finalize().await;
                } else {
                    self.send_system(ack_message(def.name, updated.next_unfilled()));
                }
            }
            Err(rejection) => {
                tracing::info!(field = %args.field_name, ?rejection, "save rejected");
                self.send_system(rejection.correction_message());
            }
        }
    }

    /// Confirmation accepted: submit, archive, clear and hand off
    async fn finalize(&mut self) {
        tracing::info!("intake confirmed, finalizing");
        if let Some(api) = self.api.clone() {
            let payload = self.record.snapshot().submission_payload();
            if let Err(e) = api.submit_record(&payload).await {
                tracing::error!("record submission failed: {e}");
            }
            if let Err(e) = api.save_transcript(&self.conversation).await {
                tracing::warn!("transcript archival failed: {e}");
            }
            if let Err(e) = api.clear_server_session().await {
                tracing::warn!("server session clear failed: {e}");
            }
        }
        if let Err(e) = self.recovery.clear() {
            tracing::warn!("failed to clear recovery snapshot: {e}");
        }
        self.stopping = true;
        self.connection.disconnect();
        self.ui.open_review().await;
    }

    fn send_system(&self, content: String) {
        if let Err(e) = self.connection.send(ClientMessage::SystemMessage { content }) {
            tracing::warn!("could not send system message: {e}");
        }
    }

    /// Best effort; a failed save must never interrupt the interview
    fn persist_snapshot(&self) {
        let snapshot = RecoverySnapshot {
            record: self.record.snapshot(),
            conversation: self.conversation.clone(),
            last_updated_field: self.last_updated_field.clone(),
            started_at: self.conversation.started_at(),
            saved_at: chrono::Utc::now(),
        };
        if let Err(e) = self.recovery.save(&snapshot) {
            tracing::warn!("recovery snapshot save failed: {e}");
        }
    }

    fn arm_stall(&mut self) {
        self.stall_deadline =
            TokioInstant::now() + Duration::from_millis(self.settings.session.stall_timeout_ms);
        self.stall_armed = true;
    }
}

/// System instructions for the intake agent, rendered from the field schema
pub fn intake_instructions() -> String {
    let mut text = String::from(
        "You are a warm, professional medical intake assistant conducting a voice interview. \
         Ask one question at a time and save every answer with the save_patient_field tool. \
         Collect the sections strictly in order:\n",
    );
    for group in FieldGroup::ALL {
        text.push_str(&format!("\n{}:\n", group.title()));
        for def in FIELDS.iter().filter(|f| f.group == group) {
            if def.mandatory {
                text.push_str(&format!("- {} (required)\n", def.name));
            } else {
                text.push_str(&format!(
                    "- {} (optional; save \"{NOT_NEEDED}\" if the patient declines)\n",
                    def.name
                ));
            }
        }
    }
    text.push_str(
        "\nWhen every field is filled, read the record back and save the patient's yes or no \
         answer to the confirmation field.",
    );
    text
}

/// A transcript counts as an answer when it has any word-like content
fn is_meaningful_utterance(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.chars().filter(|c| c.is_alphanumeric()).count() >= 2
}

/// Steering message after a successful save
fn ack_message(field: &str, next: Option<&str>) -> String {
    match next {
        Some(next) => format!(
            "Saved {field}. Continue the interview with the patient's {next}."
        ),
        None => format!(
            "Saved {field}. Every field is filled; summarize the record and ask the patient \
             to confirm it."
        ),
    }
}

/// Context replayed to the model after a reconnect or a resumed session
fn replay_message(
    record: &PatientRecord,
    conversation: &ConversationLog,
    last_field: Option<&str>,
) -> String {
    let mut msg = String::from(
        "This interview resumed after an interruption. Do not restart or re-ask answered \
         questions.\n\nConversation so far:\n",
    );
    msg.push_str(&conversation.render_plain());
    msg.push_str("\nCollected record:\n");
    for (field, value) in record.iter_schema() {
        msg.push_str(&format!("{field}: {value}\n"));
    }
    if let Some(last) = last_field {
        msg.push_str(&format!("\nLast saved field: {last}."));
    }
    match record.next_unfilled() {
        Some(next) => msg.push_str(&format!(" Continue with the patient's {next}.")),
        None => msg.push_str(" Every field is filled; ask the patient to confirm the record."),
    }
    msg
}
