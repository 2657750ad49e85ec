//! Payload assembly: source campaign → typed target draft.
//!
//! For each channel the assembler applies, in order: name, schedule, goals,
//! audience, then the variation split that drives content and weights.
//! Variant text goes through asset migration first and template rewriting
//! second, so the rewriter only ever sees already re-hosted URLs.

use tracing::{debug, info, instrument};

use migrator_assets::AssetMigrator;
use migrator_shared::{
    AndroidPushMessage, Channel, EmailMessage, IosPushMessage, MigratorError, Result,
    SegmentMap, SmsMessage, SourceCampaign, SourceContentBlock, TargetCredentials, VariationContent,
    WebPushMessage,
};
use migrator_transform::{
    GoalStyle, ScheduleClock, TemplateRewriter, VariantSplit, limits, map_goals, plain_bounded,
    split, translate, truncate_with_ellipsis,
};

use crate::audience::{map_audience, trigger_segmentation};
use crate::payload::{
    AndroidAction, AndroidContent, CampaignDocument, ContentBlockDraft, DraftCommon, EmailContent,
    EmailDraft, ImageWidget, IosAction, IosContent, Platform, PlatformContent, PushDraft,
    SmsConnector, SmsContent, SmsDraft, TargetPayload, WebButton, WebContent,
};

const DEFAULT_EMAIL_NAME: &str = "Default Campaign Name";
const DEFAULT_PUSH_NAME: &str = "Default Push Campaign";
const DEFAULT_SMS_NAME: &str = "Default SMS Campaign";
const UNNAMED_BLOCK: &str = "Unnamed Block";
const DEFAULT_BUTTON_TEXT: &str = "button";

static NO_SEGMENT_MAP: SegmentMap = SegmentMap::new();

/// Builds target drafts for one migration request.
pub struct Assembler<'a> {
    assets: &'a AssetMigrator,
    rewriter: &'a dyn TemplateRewriter,
    credentials: &'a TargetCredentials,
    clock: ScheduleClock,
    segment_map: &'a SegmentMap,
    sms_connector: Option<SmsConnector>,
}

impl<'a> Assembler<'a> {
    pub fn new(
        assets: &'a AssetMigrator,
        rewriter: &'a dyn TemplateRewriter,
        credentials: &'a TargetCredentials,
        clock: ScheduleClock,
    ) -> Self {
        Self {
            assets,
            rewriter,
            credentials,
            clock,
            segment_map: &NO_SEGMENT_MAP,
            sms_connector: None,
        }
    }

    /// Source → target segment mapping. Without one every audience is all users.
    pub fn with_segment_map(mut self, segment_map: &'a SegmentMap) -> Self {
        self.segment_map = segment_map;
        self
    }

    /// Sender connector injected into SMS drafts.
    pub fn with_sms_connector(mut self, connector: SmsConnector) -> Self {
        self.sms_connector = Some(connector);
        self
    }

    /// Assemble the draft for `campaign.channel`.
    #[instrument(skip_all, fields(channel = %campaign.channel))]
    pub async fn assemble(&self, campaign: &SourceCampaign) -> Result<TargetPayload> {
        let payload = match campaign.channel {
            Channel::Email => TargetPayload::Email(CampaignDocument::new(
                self.assemble_email(campaign).await?,
            )),
            Channel::Push => {
                TargetPayload::Push(CampaignDocument::new(self.assemble_push(campaign).await?))
            }
            Channel::Sms => {
                TargetPayload::Sms(CampaignDocument::new(self.assemble_sms(campaign).await?))
            }
            Channel::ContentBlock => {
                return Err(MigratorError::validation(
                    "content blocks are assembled from a content-block document, not a campaign",
                ));
            }
        };

        info!(name = payload.name(), "draft assembled");
        Ok(payload)
    }

    pub async fn assemble_email(&self, campaign: &SourceCampaign) -> Result<EmailDraft> {
        let campaign_type = if campaign.schedule.is_triggered() {
            "Email Triggers"
        } else {
            "Email Campaign"
        };
        let common = self.common(campaign, DEFAULT_EMAIL_NAME, campaign_type);
        let goals = map_goals(&campaign.conversion_behaviors, GoalStyle::Flat);

        let split = split(
            Channel::Email.as_str(),
            &campaign.variations,
            email_of,
            |message| self.email_content(message),
        )
        .await?;
        debug!(variants = split.len(), "email variants split");

        Ok(EmailDraft::new(
            common,
            goals,
            trigger_segmentation(Channel::Email),
            split,
        ))
    }

    /// Push splits each platform on its own; platforms without variants are
    /// left out, and a campaign with no platform at all is rejected.
    pub async fn assemble_push(&self, campaign: &SourceCampaign) -> Result<PushDraft> {
        let campaign_type = if campaign.schedule.is_triggered() {
            "Autotrigger Campaign"
        } else {
            "General Push Campaign"
        };
        let common = self.common(campaign, DEFAULT_PUSH_NAME, campaign_type);
        let goals = map_goals(&campaign.conversion_behaviors, GoalStyle::Ranked);

        let mut splits = Vec::new();
        for platform in Platform::ALL {
            let result = match platform {
                Platform::Android => {
                    split(platform.slot(), &campaign.variations, android_of, |m| async move {
                        PlatformContent::Android(self.android_content(m).await)
                    })
                    .await
                }
                Platform::Ios => {
                    split(platform.slot(), &campaign.variations, ios_of, |m| async move {
                        PlatformContent::Ios(self.ios_content(m).await)
                    })
                    .await
                }
                Platform::Web => {
                    split(platform.slot(), &campaign.variations, web_of, |m| async move {
                        PlatformContent::Web(self.web_content(m).await)
                    })
                    .await
                }
            };

            match result {
                Ok(platform_split) => splits.push((platform, platform_split)),
                Err(MigratorError::NoVariations { .. }) => {
                    debug!(%platform, "no variants for platform, dropped");
                }
                Err(e) => return Err(e),
            }
        }

        if splits.is_empty() {
            return Err(MigratorError::NoVariations {
                channel: Channel::Push.as_str().to_string(),
            });
        }

        Ok(PushDraft::new(
            common,
            goals,
            trigger_segmentation(Channel::Push),
            splits,
        ))
    }

    pub async fn assemble_sms(&self, campaign: &SourceCampaign) -> Result<SmsDraft> {
        let common = self.common(campaign, DEFAULT_SMS_NAME, "sms");
        let goals = map_goals(&campaign.conversion_behaviors, GoalStyle::Flat);

        let split: VariantSplit<SmsContent> = split(
            Channel::Sms.as_str(),
            &campaign.variations,
            sms_of,
            |message| self.sms_content(message),
        )
        .await?;

        let connector = match &self.sms_connector {
            Some(connector) => connector.clone(),
            None => {
                debug!("no SMS sender settings supplied, using default connector");
                SmsConnector::default()
            }
        };

        Ok(SmsDraft::new(common, goals, connector, split))
    }

    /// Content-block create document with re-hosted assets.
    #[instrument(skip_all, fields(block = block.name.as_deref().unwrap_or(UNNAMED_BLOCK)))]
    pub async fn assemble_content_block(&self, block: &SourceContentBlock) -> ContentBlockDraft {
        let content = self.process_text(&block.content).await;
        ContentBlockDraft::new(
            block.name.as_deref().unwrap_or(UNNAMED_BLOCK),
            block.description.clone(),
            content,
            self.credentials.created_by_email.clone(),
        )
    }

    // -----------------------------------------------------------------------
    // Shared steps
    // -----------------------------------------------------------------------

    fn common(
        &self,
        campaign: &SourceCampaign,
        default_name: &str,
        campaign_type: &str,
    ) -> DraftCommon {
        let name = campaign
            .name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(default_name);
        let schedule = translate(&campaign.schedule, &self.clock);
        let segmentation = map_audience(
            campaign.channel,
            &campaign.schedule,
            &campaign.audience,
            self.segment_map,
        );

        DraftCommon::new(
            name,
            campaign_type,
            (
                self.clock.timezone.name().to_string(),
                self.clock.offset_label.clone(),
            ),
            schedule,
            segmentation,
        )
    }

    /// Re-host assets, then rewrite template syntax.
    async fn process_text(&self, text: &str) -> String {
        let migrated = self.assets.migrate_assets(text, self.credentials).await;
        self.rewriter.rewrite(&migrated)
    }

    fn rewrite(&self, text: Option<&str>) -> String {
        self.rewriter.rewrite(text.unwrap_or_default())
    }

    async fn image(&self, url: Option<&str>) -> Option<String> {
        match url.filter(|u| !u.is_empty()) {
            Some(url) => Some(self.assets.migrate_single_url(url, self.credentials).await),
            None => None,
        }
    }

    // -----------------------------------------------------------------------
    // Per-channel variant content
    // -----------------------------------------------------------------------

    async fn email_content(&self, message: &EmailMessage) -> EmailContent {
        let subject = self
            .process_text(message.email_subject.as_deref().unwrap_or_default())
            .await;
        let preheader = self
            .process_text(message.preheader.as_deref().unwrap_or_default())
            .await;
        // The body is bounded before re-hosting so a cut never lands inside a target URL.
        let body = truncate_with_ellipsis(
            message.email_body.as_deref().unwrap_or_default(),
            limits::EMAIL_HTML,
        );
        let html = self.process_text(&body).await;

        EmailContent::new(
            truncate_with_ellipsis(&subject, limits::EMAIL_SUBJECT),
            truncate_with_ellipsis(&preheader, limits::EMAIL_PREHEADER),
            html,
            message.from_display_name.clone(),
            message.from_address.clone(),
            message.reply_to_address.clone(),
        )
    }

    async fn sms_content(&self, message: &SmsMessage) -> SmsContent {
        SmsContent::new(
            self.process_text(message.body.as_deref().unwrap_or_default())
                .await,
        )
    }

    async fn android_content(&self, message: &AndroidPushMessage) -> AndroidContent {
        let mut content = AndroidContent::new(
            self.push_title(message.android_title.as_deref()),
            self.push_message(message.android_push_message.as_deref()),
        );

        if let Some(url) = self.image(message.image_url.as_deref()).await {
            content.widgets.push(ImageWidget::from_url(url));
        }

        content.actions = message
            .android_push_buttons
            .iter()
            .filter_map(|button| {
                let uri = self.rewrite(button.uri.as_deref());
                let name = Some(button_text(button.text.as_deref()));
                match button.action_type.as_deref() {
                    Some("DEEP_LINK") => Some(AndroidAction::deep_link(uri, name)),
                    Some("URI") => Some(AndroidAction::rich_landing(uri, name)),
                    _ => None,
                }
            })
            .collect();

        if content.actions.is_empty() {
            let uri = self.rewrite(message.android_custom_uri.as_deref());
            content.actions.push(AndroidAction::deep_link(uri, None));
        }
        content
    }

    async fn ios_content(&self, message: &IosPushMessage) -> IosContent {
        let mut content = IosContent::new(
            self.push_title(message.ios_alert_hash.title.as_deref()),
            self.push_message(message.ios_push_message.as_deref()),
        );

        if let Some(url) = self.image(message.ios_image_url.as_deref()).await {
            content.widgets.push(ImageWidget::from_url(url));
        }

        content.actions = if message.ios_push_buttons.is_empty() {
            vec![IosAction::deep_link(self.rewrite(message.ios_uri.as_deref()))]
        } else {
            vec![IosAction::InviteCategory]
        };
        content
    }

    async fn web_content(&self, message: &WebPushMessage) -> WebContent {
        let mut content = WebContent::new(
            self.push_title(message.web_title.as_deref()),
            self.push_message(message.web_push_message.as_deref()),
        );

        let source_image = message
            .image_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or(message.large_image_url.as_deref());
        if let Some(url) = self.image(source_image).await {
            content.widgets.push(ImageWidget::from_url(url.clone()));
            content.image_url = Some(url);
        }

        if message.web_push_buttons.is_empty() {
            if let Some(uri) = message.web_custom_uri.as_deref().filter(|u| !u.is_empty()) {
                content.redirect_url = self.rewriter.rewrite(uri);
            }
        } else {
            content.buttons.push(WebButton::default());
            for (i, button) in message.web_push_buttons.iter().enumerate() {
                content.buttons.push(WebButton {
                    action: Some(i as u32 + 1),
                    title: Some(button_text(button.text.as_deref())),
                    url: Some(self.rewrite(button.uri.as_deref())),
                });
            }
        }
        content
    }

    fn push_title(&self, title: Option<&str>) -> String {
        self.rewriter
            .rewrite(&plain_bounded(title.unwrap_or_default(), limits::PUSH_TITLE))
    }

    fn push_message(&self, message: Option<&str>) -> String {
        self.rewriter
            .rewrite(&plain_bounded(message.unwrap_or_default(), limits::PUSH_MESSAGE))
    }
}

fn button_text(text: Option<&str>) -> String {
    text.filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_BUTTON_TEXT)
        .to_string()
}

// ---------------------------------------------------------------------------
// Variant selectors
// ---------------------------------------------------------------------------

fn email_of(content: &VariationContent) -> Option<&EmailMessage> {
    match content {
        VariationContent::Email(message) => Some(message),
        _ => None,
    }
}

fn sms_of(content: &VariationContent) -> Option<&SmsMessage> {
    match content {
        VariationContent::Sms(message) => Some(message),
        _ => None,
    }
}

fn android_of(content: &VariationContent) -> Option<&AndroidPushMessage> {
    match content {
        VariationContent::AndroidPush(message) => Some(message),
        _ => None,
    }
}

fn ios_of(content: &VariationContent) -> Option<&IosPushMessage> {
    match content {
        VariationContent::IosPush(message) => Some(message),
        _ => None,
    }
}

fn web_of(content: &VariationContent) -> Option<&WebPushMessage> {
    match content {
        VariationContent::WebPush(message) => Some(message),
        _ => None,
    }
}
