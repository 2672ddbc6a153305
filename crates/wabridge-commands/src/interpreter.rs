//! Command execution against a live session.
//!
//! One invocation per inbound message, no state across invocations. The
//! interpreter never lets an error escape to the event router: every
//! failure inside authorization or dispatch is logged and turned into a
//! fixed-text reply with the message still counted as handled.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{Local, NaiveDate};
use tracing::{error, info, warn};

use wabridge_models::{jid, MediaContent, MessageContent, MessageEnvelope};
use wabridge_protocol::{OutgoingContent, ProtocolClient, SendOptions};

use crate::api::{JournalPayload, SchoolApi};
use crate::error::{CommandError, Result};
use crate::parser::{self, Command, CommandName, JournalArgs, ParseError, ReportKind};
use crate::{alias, build_report_query};

/// Fixed user-visible replies.
pub mod replies {
    pub const UNAUTHORIZED: &str = "Anda tidak dapat menggunakan fitur ini.";
    pub const BAD_DATE: &str =
        "Format tanggal salah. Gunakan format: #jurnal DD-MM-YYYY\nContoh: #jurnal 03-02-2026";
    pub const NOT_A_REPLY: &str =
        "Harap reply sebuah gambar untuk menggunakan perintah #jurnal";
    pub const NOT_AN_IMAGE: &str =
        "Pesan yang direply bukan gambar. Mohon reply pesan gambar.";
    pub const JOURNAL_USAGE: &str =
        "Format jurnal salah. Gunakan: #jurnal [DD-MM-YYYY] <kelas> <materi>";
    pub const JOURNAL_FAILED: &str = "Maaf, terjadi kesalahan saat menyimpan jurnal.";
    pub const REPORT_FETCH_FAILED: &str =
        "Maaf, terjadi kesalahan saat mengambil laporan.";
    pub const REPORT_PROCESS_FAILED: &str =
        "Maaf, terjadi kesalahan saat memproses permintaan laporan.";
    pub const GENERIC_FAILURE: &str = "Terjadi kesalahan saat memproses perintah.";
}

/// Note attached to every journal entry created from chat.
const JOURNAL_NOTE: &str = "Jurnal via WhatsApp Bot";

/// Authorization and reporting settings.
#[derive(Debug, Clone, Default)]
pub struct InterpreterConfig {
    /// Canonical (digits-only) sender numbers allowed to run commands.
    pub authorized_numbers: Vec<String>,
    /// Number that receives a copy of successful journal confirmations.
    pub report_recipient: Option<String>,
}

/// Where the journal image comes from.
enum ImageSource {
    /// The command replies to an image; carries the quoted author.
    Quoted {
        media: MediaContent,
        participant: Option<String>,
    },
    /// The message itself is an image with a caption.
    Direct(MediaContent),
}

/// A recognized invocation awaiting authorization.
enum Invocation {
    Text(CommandName),
    Caption(JournalArgs, MediaContent),
}

/// Stateless executor for in-chat commands.
pub struct CommandInterpreter {
    config: InterpreterConfig,
    api: SchoolApi,
}

impl CommandInterpreter {
    pub fn new(config: InterpreterConfig, api: SchoolApi) -> Self {
        Self { config, api }
    }

    /// Handles one group message. Returns true when the message was
    /// consumed as a command (including refusals and error replies), so
    /// the router excludes it from the webhook payload.
    pub async fn handle(&self, client: &dyn ProtocolClient, msg: &MessageEnvelope) -> bool {
        match self.dispatch(client, msg).await {
            Ok(handled) => handled,
            Err(e) => {
                error!(
                    conversation = %msg.key.remote_jid,
                    error = %e,
                    "Command handler failed"
                );
                let _ = self.reply(client, msg, replies::GENERIC_FAILURE, false).await;
                true
            }
        }
    }

    async fn dispatch(&self, client: &dyn ProtocolClient, msg: &MessageEnvelope) -> Result<bool> {
        let Some(invocation) = Self::recognize(msg) else {
            return Ok(false);
        };

        let sender = jid::canonical_user(msg.key.sender());
        if !self.config.authorized_numbers.contains(&sender) {
            warn!(sender = %sender, "Unauthorized command attempt");
            self.reply(client, msg, replies::UNAUTHORIZED, false).await?;
            return Ok(true);
        }

        match invocation {
            Invocation::Text(CommandName::Report) => {
                self.run_report(client, msg).await?;
            }
            Invocation::Text(CommandName::Journal) => {
                self.run_journal_command(client, msg).await?;
            }
            Invocation::Caption(args, media) => {
                self.run_journal(client, msg, args, ImageSource::Direct(media))
                    .await?;
            }
        }
        Ok(true)
    }

    /// Decides whether a message is a command invocation at all.
    ///
    /// A bare image only counts when its caption parses to a complete
    /// class/topic pair; an incomplete caption is an ordinary photo and
    /// must keep flowing to the webhook.
    fn recognize(msg: &MessageEnvelope) -> Option<Invocation> {
        if let Some(text) = msg.text() {
            return parser::recognize(text).map(Invocation::Text);
        }

        if let MessageContent::Image(media) = &msg.content {
            let caption = media.caption.as_deref()?;
            let args = parser::parse_caption(caption).ok()?;
            if args.class.is_some() && args.topic.is_some() {
                return Some(Invocation::Caption(args, media.clone()));
            }
        }
        None
    }

    async fn run_report(&self, client: &dyn ProtocolClient, msg: &MessageEnvelope) -> Result<()> {
        let text = msg.text().unwrap_or_default();
        let Ok(Some(Command::Report(args))) = parser::parse(text) else {
            return Ok(());
        };

        // Guru reports without an explicit id fall back to the sending
        // participant.
        let arg = match (&args.kind, &args.arg) {
            (ReportKind::Guru, None) => msg.key.participant.clone(),
            _ => args.arg.clone(),
        };

        let query = build_report_query(&args.kind, arg.as_deref(), today());
        match self.api.fetch_report_pdf(&query.query).await {
            Ok(pdf) => {
                info!(
                    conversation = %msg.key.remote_jid,
                    filename = %query.filename,
                    "Report fetched"
                );
                client
                    .send(
                        &msg.key.remote_jid,
                        OutgoingContent::Document {
                            data: pdf,
                            mimetype: "application/pdf".to_string(),
                            file_name: query.filename,
                            caption: Some(format!(
                                "Berikut adalah laporan {} yang diminta",
                                args.kind.as_str()
                            )),
                        },
                        SendOptions::quoting(&msg.key),
                    )
                    .await?;
            }
            Err(CommandError::ApiStatus(status)) => {
                warn!(status, "Report API returned failure status");
                self.reply(client, msg, replies::REPORT_FETCH_FAILED, true)
                    .await?;
            }
            Err(e) => {
                warn!(error = %e, "Report request failed");
                self.reply(client, msg, replies::REPORT_PROCESS_FAILED, true)
                    .await?;
            }
        }
        Ok(())
    }

    async fn run_journal_command(
        &self,
        client: &dyn ProtocolClient,
        msg: &MessageEnvelope,
    ) -> Result<()> {
        let text = msg.text().unwrap_or_default();
        let args = match parser::parse(text) {
            Ok(Some(Command::Journal(args))) => args,
            Err(ParseError::InvalidDate(_)) => {
                self.reply(client, msg, replies::BAD_DATE, false).await?;
                return Ok(());
            }
            _ => return Ok(()),
        };

        let context = msg.content.context_info();
        let Some(quoted) = context.and_then(|c| c.quoted_message.as_deref()) else {
            self.reply(client, msg, replies::NOT_A_REPLY, false).await?;
            return Ok(());
        };
        let MessageContent::Image(media) = quoted else {
            self.reply(client, msg, replies::NOT_AN_IMAGE, false).await?;
            return Ok(());
        };

        let source = ImageSource::Quoted {
            media: media.clone(),
            participant: context.and_then(|c| c.participant.clone()),
        };
        self.run_journal(client, msg, args, source).await
    }

    async fn run_journal(
        &self,
        client: &dyn ProtocolClient,
        msg: &MessageEnvelope,
        args: JournalArgs,
        source: ImageSource,
    ) -> Result<()> {
        let (Some(class), Some(topic)) = (args.class.as_deref(), args.topic.as_deref()) else {
            self.reply(client, msg, replies::JOURNAL_USAGE, false).await?;
            return Ok(());
        };

        let (media, author) = match &source {
            ImageSource::Quoted { media, participant } => (media, participant.clone()),
            ImageSource::Direct(media) => (media, None),
        };

        // The journal entry is attributed to the image author for replies,
        // else to the sending participant.
        let no_lid = author
            .or_else(|| msg.key.participant.clone())
            .unwrap_or_else(|| msg.key.remote_jid.clone());
        let no_lid = jid::canonical_user(&no_lid);

        let image = client.download_media(&msg.key, media).await?;
        let date = args.date.unwrap_or_else(today);

        let payload = JournalPayload {
            no_lid,
            kelas: alias::canonical_class(class),
            materi: topic.to_string(),
            keterangan: JOURNAL_NOTE.to_string(),
            foto: format!("data:{};base64,{}", media.mimetype, BASE64.encode(&image)),
            tanggal: date.format("%Y-%m-%d").to_string(),
        };

        match self.api.create_journal(&payload).await {
            Ok(data) => {
                let confirmation = format!(
                    "Pengisian jurnal atas nama {} berhasil dilakukan pada tanggal {}",
                    data.nama_guru, data.tanggal
                );
                self.reply(client, msg, &confirmation, true).await?;
                self.send_report_copy(client, msg, &confirmation).await;
            }
            Err(e) => {
                warn!(error = %e, "Journal API call failed");
                self.reply(client, msg, replies::JOURNAL_FAILED, true).await?;
            }
        }
        Ok(())
    }

    /// Forwards a success confirmation to the configured report number.
    /// Best-effort: a failed copy never fails the invocation.
    async fn send_report_copy(
        &self,
        client: &dyn ProtocolClient,
        msg: &MessageEnvelope,
        confirmation: &str,
    ) {
        let Some(recipient) = self.config.report_recipient.as_deref() else {
            return;
        };
        let submitter = msg.push_name.as_deref().unwrap_or("-");
        let phone = jid::canonical_user(msg.key.sender());
        let copy = format!("Laporan: {confirmation}\n\nOleh: {submitter} ({phone})");
        if let Err(e) = client
            .send(
                &jid::format_phone(recipient),
                OutgoingContent::Text(copy),
                SendOptions::default(),
            )
            .await
        {
            warn!(error = %e, "Failed to forward journal confirmation");
        }
    }

    async fn reply(
        &self,
        client: &dyn ProtocolClient,
        msg: &MessageEnvelope,
        text: &str,
        quoted: bool,
    ) -> Result<()> {
        let options = if quoted {
            SendOptions::quoting(&msg.key)
        } else {
            SendOptions::default()
        };
        client
            .send(
                &msg.key.remote_jid,
                OutgoingContent::Text(text.to_string()),
                options,
            )
            .await?;
        Ok(())
    }
}

/// Current date in local time, used when no date override is given.
fn today() -> NaiveDate {
    Local::now().date_naive()
}
