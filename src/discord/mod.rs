use crate::{
    config::DiscordConfig,
    error::Result,
    matcher::entry_matches,
    store::{AddOutcome, RemoveOutcome, WatchStore},
    types::{MatchMode, RemoveTarget, UnregisterAction, WatchEntry},
};
use serenity::{
    all::{Command, CreateInteractionResponse, CreateInteractionResponseMessage},
    async_trait,
    builder::{CreateButton, CreateCommand, CreateCommandOption, CreateEmbed, CreateMessage},
    client::{Context, EventHandler},
    model::{
        application::{ButtonStyle, CommandInteraction, CommandOptionType, Interaction},
        channel::{Embed, Message},
        colour::Colour,
        gateway::Ready,
        id::{GuildId, UserId},
        mention::Mentionable,
        user::User,
    },
    prelude::*,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Embed content lowered to plain text parts.
///
/// The scan only cares about the text a reader would see, so embeds are
/// flattened at the serenity boundary and the blob builder stays SDK-free.
#[derive(Debug, Clone, Default)]
pub struct EmbedText {
    pub title: Option<String>,
    pub description: Option<String>,
    pub fields: Vec<(String, String)>,
    pub footer: Option<String>,
}

impl From<&Embed> for EmbedText {
    fn from(embed: &Embed) -> Self {
        Self {
            title: embed.title.clone(),
            description: embed.description.clone(),
            fields: embed
                .fields
                .iter()
                .map(|f| (f.name.clone(), f.value.clone()))
                .collect(),
            footer: embed.footer.as_ref().map(|f| f.text.clone()),
        }
    }
}

/// Concatenate a message body and its embeds into one searchable blob.
///
/// Order per embed: title, description, each field as `name: value`, footer.
/// Parts are newline-joined.
pub fn searchable_text(body: &str, embeds: &[EmbedText]) -> String {
    let mut parts = vec![body.to_string()];
    for embed in embeds {
        if let Some(title) = &embed.title {
            parts.push(title.clone());
        }
        if let Some(description) = &embed.description {
            parts.push(description.clone());
        }
        for (name, value) in &embed.fields {
            parts.push(format!("{}: {}", name, value));
        }
        if let Some(footer) = &embed.footer {
            parts.push(footer.clone());
        }
    }
    parts.join("\n")
}

/// Discord bot handler: watches channels and DMs matching users
pub struct WatchBot {
    store: Arc<WatchStore>,
    /// Companion bot whose messages are never scanned
    excluded_bot_id: Option<u64>,
}

impl WatchBot {
    pub fn new(store: Arc<WatchStore>, excluded_bot_id: Option<u64>) -> Self {
        Self {
            store,
            excluded_bot_id,
        }
    }
}

#[async_trait]
impl EventHandler for WatchBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);

        let notify = CreateCommand::new("notify")
            .description("Manage keyword notifications for this channel")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "action",
                    "What to do with your registered words",
                )
                .required(true)
                .add_string_choice("add", "add")
                .add_string_choice("remove", "remove")
                .add_string_choice("list", "list"),
            )
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "word",
                    "Word or pattern to register (add)",
                )
                .required(false),
            )
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "mode",
                    "How the word is matched (add, default: partial)",
                )
                .required(false)
                .add_string_choice("partial match", "p")
                .add_string_choice("exact match", "e")
                .add_string_choice("regex", "r"),
            )
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "target_id",
                    "Entry id to remove, or `all` (remove)",
                )
                .required(false),
            );

        // Registration failures are logged, never fatal
        if let Err(why) = Command::create_global_command(&ctx.http, notify).await {
            error!("Cannot create notify slash command: {:?}", why);
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Never scan the companion bot, it would loop on our notifications
        if self.excluded_bot_id == Some(msg.author.id.get()) {
            return;
        }

        let channel_id = msg.channel_id.get().to_string();
        let watchers = match self.store.channel_watchers(&channel_id).await {
            Ok(Some(watchers)) => watchers,
            Ok(None) => return,
            Err(e) => {
                error!("Failed to load registrations for scan: {:?}", e);
                return;
            }
        };

        let embed_texts: Vec<EmbedText> = msg.embeds.iter().map(EmbedText::from).collect();
        let blob = searchable_text(&msg.content, &embed_texts);

        for (user_id, entries) in watchers {
            let uid = match user_id.parse::<u64>() {
                Ok(uid) => uid,
                Err(_) => {
                    warn!("Skipping non-numeric user key in watch file: {}", user_id);
                    continue;
                }
            };

            let dm = match UserId::new(uid).create_dm_channel(&ctx.http).await {
                Ok(dm) => dm,
                Err(e) => {
                    warn!("Could not open DM channel for user {}: {}", uid, e);
                    continue;
                }
            };

            for entry in &entries {
                if !entry_matches(&blob, entry) {
                    continue;
                }

                let notification = notification_message(&msg, entry, uid);
                if let Err(e) = dm.id.send_message(&ctx.http, notification).await {
                    // DMs closed or similar; never fatal to other recipients
                    warn!("Could not DM user {} for entry {}: {}", uid, entry.id, e);
                    continue;
                }

                // Forward each original embed as its own follow-up DM
                for embed in &msg.embeds {
                    let forward = CreateMessage::new().embed(CreateEmbed::from(embed.clone()));
                    if let Err(e) = dm.id.send_message(&ctx.http, forward).await {
                        warn!("Could not forward embed to user {}: {}", uid, e);
                    }
                }
            }
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => {
                if command.data.name == "notify" {
                    self.handle_notify_command(&ctx, &command).await;
                } else {
                    warn!("Unknown command: {}", command.data.name);
                }
            }
            Interaction::Component(component) => {
                let Some(action) = UnregisterAction::from_custom_id(&component.data.custom_id)
                else {
                    warn!(
                        "Ignoring component with malformed custom id: {}",
                        component.data.custom_id
                    );
                    return;
                };

                let content = match self
                    .store
                    .remove_by_id_anywhere(
                        &action.channel_id.to_string(),
                        &action.user_id.to_string(),
                        &action.entry_id,
                    )
                    .await
                {
                    Ok(true) => format!("🗑️ Unregistered `{}`.", action.entry_id),
                    Ok(false) => "❌ That registration was already removed.".to_string(),
                    Err(e) => {
                        error!("Failed to unregister via button: {:?}", e);
                        "❌ Something went wrong removing that registration.".to_string()
                    }
                };

                if let Err(why) = component
                    .create_response(
                        &ctx.http,
                        CreateInteractionResponse::Message(
                            CreateInteractionResponseMessage::new()
                                .content(content)
                                .ephemeral(true),
                        ),
                    )
                    .await
                {
                    error!("Cannot respond to unregister button: {:?}", why);
                }
            }
            _ => {}
        }
    }

    async fn guild_member_removal(
        &self,
        ctx: Context,
        guild_id: GuildId,
        user: User,
        _member_data_if_available: Option<serenity::model::guild::Member>,
    ) {
        self.purge_departed(&ctx, guild_id, &user, "left").await;
    }

    async fn guild_ban_addition(&self, ctx: Context, guild_id: GuildId, banned_user: User) {
        self.purge_departed(&ctx, guild_id, &banned_user, "was banned from")
            .await;
    }
}

impl WatchBot {
    async fn handle_notify_command(&self, ctx: &Context, command: &CommandInteraction) {
        info!(
            "Processing notify command from user {}",
            command.user.name
        );

        let option = |name: &str| {
            command
                .data
                .options
                .iter()
                .find(|opt| opt.name == name)
                .and_then(|opt| opt.value.as_str())
        };

        let channel_id = command.channel_id.get().to_string();
        let user_id = command.user.id.get().to_string();

        let content = match option("action").unwrap_or_default() {
            "add" => {
                let word = option("word").unwrap_or_default();
                let mode = option("mode")
                    .and_then(MatchMode::from_flag)
                    .unwrap_or(MatchMode::Partial);

                if word.is_empty() {
                    "❌ Provide a word to register.".to_string()
                } else {
                    match self.store.add(&channel_id, &user_id, word, mode).await {
                        Ok(AddOutcome::Added(entry)) => format!(
                            "✅ Registered!\nID: {}, word: `{}`, mode: {}",
                            entry.id, entry.word, entry.mode
                        ),
                        Ok(AddOutcome::Duplicate) => {
                            "❌ That word is already registered.".to_string()
                        }
                        Err(e) => {
                            error!("Failed to add registration: {:?}", e);
                            "❌ Could not save that registration.".to_string()
                        }
                    }
                }
            }
            "remove" => match option("target_id") {
                None => "❌ Provide an entry id, or `all`.".to_string(),
                Some(raw) => {
                    let target = RemoveTarget::parse(raw);
                    match self.store.remove(&channel_id, &user_id, &target).await {
                        Ok(RemoveOutcome::ClearedAll) => {
                            "🗑️ Removed every registered word.".to_string()
                        }
                        Ok(RemoveOutcome::Removed(id)) => format!("🗑️ Removed ID `{}`.", id),
                        Ok(RemoveOutcome::NotFound) => {
                            "❌ No registration with that ID was found.".to_string()
                        }
                        Err(e) => {
                            error!("Failed to remove registration: {:?}", e);
                            "❌ Could not update your registrations.".to_string()
                        }
                    }
                }
            },
            "list" => match self.store.list(&channel_id, &user_id).await {
                Ok(entries) => match entries.as_deref() {
                    None | Some([]) => "📭 No registered words.".to_string(),
                    Some(entries) => {
                        let lines = entries
                            .iter()
                            .map(|e| format!("ID: {} | `{}` | mode: {}", e.id, e.word, e.mode))
                            .collect::<Vec<_>>()
                            .join("\n");
                        format!("📋 Registered words:\n{}", lines)
                    }
                },
                Err(e) => {
                    error!("Failed to list registrations: {:?}", e);
                    "❌ Could not read your registrations.".to_string()
                }
            },
            other => {
                warn!("Unknown notify action: {}", other);
                "❌ Unknown action.".to_string()
            }
        };

        if let Err(why) = command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content(content)
                        .ephemeral(true),
                ),
            )
            .await
        {
            error!("Cannot respond to notify command: {:?}", why);
        }
    }

    /// Drop a departed member's registrations in every channel of the guild.
    ///
    /// The table is keyed by channel, so the guild event has to be widened
    /// to the guild's channel ids before it can hit anything.
    async fn purge_departed(&self, ctx: &Context, guild_id: GuildId, user: &User, verb: &str) {
        let channels = match guild_id.channels(&ctx.http).await {
            Ok(channels) => channels,
            Err(e) => {
                warn!(
                    "Could not list channels of guild {} to purge user {}: {}",
                    guild_id, user.id, e
                );
                return;
            }
        };
        let channel_ids: Vec<String> = channels.keys().map(|id| id.get().to_string()).collect();

        match self
            .store
            .purge_user_in_channels(&channel_ids, &user.id.get().to_string())
            .await
        {
            Ok(0) => {}
            Ok(n) => info!(
                "Purged {} registration lists for {} who {} guild {}",
                n, user.id, verb, guild_id
            ),
            Err(e) => error!(
                "Failed to purge registrations for departed user {}: {:?}",
                user.id, e
            ),
        }
    }
}

/// Build the notification DM for one matched entry.
fn notification_message(msg: &Message, entry: &WatchEntry, recipient: u64) -> CreateMessage {
    let body = if msg.content.is_empty() {
        "(no message body)"
    } else {
        msg.content.as_str()
    };
    let embed_note = if msg.embeds.is_empty() {
        ""
    } else {
        "\nThe message includes embedded content."
    };

    let embed = CreateEmbed::new()
        .title("🔔 Keyword notification")
        .description(format!(
            "`{}` was spotted in {}!\n\n\
             👤 Sender: {}\n\
             💬 Message: {}\n\
             ⚙️ Match mode: {}{}",
            entry.word,
            msg.channel_id.mention(),
            msg.author.mention(),
            body,
            entry.mode,
            embed_note
        ))
        .colour(Colour::ORANGE);

    let action = UnregisterAction::new(recipient, msg.channel_id.get(), entry.id.clone());
    let button = CreateButton::new(action.to_custom_id())
        .label("Unregister this word")
        .style(ButtonStyle::Danger);

    CreateMessage::new().embed(embed).button(button)
}

/// Create the Discord client (without starting it)
pub async fn create_discord_client(
    config: &DiscordConfig,
    store: Arc<WatchStore>,
) -> Result<serenity::Client> {
    let handler = WatchBot::new(store, config.excluded_bot_id);

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MODERATION;

    let mut client_builder = Client::builder(&config.token, intents).event_handler(handler);

    if let Some(app_id) = config.application_id {
        client_builder = client_builder.application_id(app_id.into());
    }

    let client = client_builder
        .await
        .map_err(|source| crate::error::DiscordError::ConnectionFailed { source })?;

    Ok(client)
}

/// Create and run the Discord bot
pub async fn run_discord_bot(config: &DiscordConfig, store: Arc<WatchStore>) -> Result<()> {
    let mut client = create_discord_client(config, store).await?;

    info!("Starting Discord bot...");
    client
        .start()
        .await
        .map_err(crate::error::DiscordError::Other)?;

    Ok(())
}
