//! Request context and contextual attributes.
//!
//! A [`RequestContext`] carries everything the SDK needs to know about one request: the subject
//! identity used for bucketing, the raw enrollment-override cookie, sampling tokens, and the
//! agent/page/wiki/performer facts that become contextual attributes on analytics events.
//!
//! Computing the full attribute map is moderately expensive and invariant within a request, so it
//! is memoized: [`CachedContextualAttributes`] computes it on first access and returns the cached
//! map afterwards.
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};

use crate::{AttributeValue, ContextualAttributes};

/// The identity used to bucket the current subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectIdentity {
    /// An authenticated user with a stable per-user identifier ("mw-user" sampling unit).
    User(String),
    /// An anonymous visitor carrying an edge-assigned identifier ("edge-unique" sampling unit).
    EdgeUnique(String),
    /// No addressable identity yet. Such a subject cannot be bucketed and is treated as
    /// not-yet-enrolled, not as an error.
    Anonymous,
}

/// Facts about the user agent.
#[derive(Debug, Clone, Default)]
pub struct AgentInfo {
    pub ua_string: Option<String>,
    /// Whether the request is for the mobile site.
    pub is_mobile_view: bool,
}

/// Facts about the page the request targets, when there is one.
#[derive(Debug, Clone)]
pub struct PageInfo {
    pub id: i64,
    pub title: String,
    pub namespace_id: i64,
    pub namespace_name: Option<String>,
    pub revision_id: i64,
    pub content_language: String,
    pub is_redirect: bool,
    pub wikidata_qid: Option<String>,
    pub groups_allowed_to_move: Vec<String>,
    pub groups_allowed_to_edit: Vec<String>,
}

/// Facts about the site serving the request.
#[derive(Debug, Clone, Default)]
pub struct WikiInfo {
    pub skin: String,
    pub version: String,
    pub is_debug_mode: bool,
    pub is_production: bool,
    pub database: String,
    pub site_content_language: String,
}

/// Facts about the user performing the request.
#[derive(Debug, Clone, Default)]
pub struct PerformerInfo {
    pub is_logged_in: bool,
    pub id: i64,
    pub name: Option<String>,
    pub groups: Vec<String>,
    pub is_bot: bool,
    pub is_temp: bool,
    pub language: String,
    pub language_variant: Option<String>,
    pub edit_count: Option<i64>,
    pub registration_dt: Option<DateTime<Utc>>,
    pub can_probably_edit_page: Option<bool>,
}

/// Read-only view of one request, built by the host before enrollment runs.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub subject: SubjectIdentity,
    /// Raw value of the enrollment-override cookie, if present.
    pub overrides_cookie: Option<String>,
    /// Client-provided session token, used for instrument sampling with the "session" unit.
    pub session_token: Option<String>,
    /// Client-provided pageview token, used for instrument sampling with the "pageview" unit.
    pub pageview_token: Option<String>,
    pub agent: AgentInfo,
    pub page: Option<PageInfo>,
    pub wiki: WikiInfo,
    pub performer: PerformerInfo,
}

impl Default for SubjectIdentity {
    fn default() -> Self {
        SubjectIdentity::Anonymous
    }
}

/// Computes the full contextual attribute map for one request.
///
/// Attribute values that cannot be determined are represented as [`AttributeValue::Null`] and
/// dropped when attached to an event.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextualAttributesFactory;

impl ContextualAttributesFactory {
    pub fn new_contextual_attributes(&self, context: &RequestContext) -> ContextualAttributes {
        let mut attributes = ContextualAttributes::new();

        self.add_agent_attributes(context, &mut attributes);
        self.add_page_attributes(context, &mut attributes);
        self.add_wiki_attributes(context, &mut attributes);
        self.add_performer_attributes(context, &mut attributes);

        attributes
    }

    fn add_agent_attributes(&self, context: &RequestContext, out: &mut ContextualAttributes) {
        let family = if context.agent.is_mobile_view {
            "mobile_browser"
        } else {
            "desktop_browser"
        };

        out.insert("agent_app_install_id".to_owned(), AttributeValue::Null);
        out.insert("agent_client_platform".to_owned(), "mediawiki_rust".into());
        out.insert("agent_client_platform_family".to_owned(), family.into());
        out.insert(
            "agent_ua_string".to_owned(),
            context.agent.ua_string.clone().into(),
        );
    }

    fn add_page_attributes(&self, context: &RequestContext, out: &mut ContextualAttributes) {
        // Not every request targets a page (e.g. some API entry points).
        let Some(page) = &context.page else {
            return;
        };

        out.insert("page_id".to_owned(), page.id.into());
        out.insert("page_title".to_owned(), page.title.as_str().into());
        out.insert("page_namespace_id".to_owned(), page.namespace_id.into());
        out.insert(
            "page_namespace_name".to_owned(),
            page.namespace_name.clone().into(),
        );
        out.insert("page_revision_id".to_owned(), page.revision_id.into());
        out.insert(
            "page_content_language".to_owned(),
            page.content_language.as_str().into(),
        );
        out.insert("page_is_redirect".to_owned(), page.is_redirect.into());
        out.insert(
            "page_wikidata_qid".to_owned(),
            page.wikidata_qid.clone().into(),
        );
        out.insert(
            "page_groups_allowed_to_move".to_owned(),
            AttributeValue::StringList(page.groups_allowed_to_move.clone()),
        );
        out.insert(
            "page_groups_allowed_to_edit".to_owned(),
            AttributeValue::StringList(page.groups_allowed_to_edit.clone()),
        );
    }

    fn add_wiki_attributes(&self, context: &RequestContext, out: &mut ContextualAttributes) {
        let wiki = &context.wiki;

        out.insert("mediawiki_skin".to_owned(), wiki.skin.as_str().into());
        out.insert("mediawiki_version".to_owned(), wiki.version.as_str().into());
        out.insert(
            "mediawiki_is_debug_mode".to_owned(),
            wiki.is_debug_mode.into(),
        );
        out.insert(
            "mediawiki_is_production".to_owned(),
            wiki.is_production.into(),
        );
        out.insert("mediawiki_database".to_owned(), wiki.database.as_str().into());
        out.insert(
            "mediawiki_site_content_language".to_owned(),
            wiki.site_content_language.as_str().into(),
        );
    }

    fn add_performer_attributes(&self, context: &RequestContext, out: &mut ContextualAttributes) {
        let performer = &context.performer;

        out.insert(
            "performer_is_logged_in".to_owned(),
            performer.is_logged_in.into(),
        );
        out.insert("performer_id".to_owned(), performer.id.into());
        out.insert("performer_name".to_owned(), performer.name.clone().into());
        out.insert(
            "performer_groups".to_owned(),
            AttributeValue::StringList(performer.groups.clone()),
        );
        out.insert("performer_is_bot".to_owned(), performer.is_bot.into());
        out.insert("performer_is_temp".to_owned(), performer.is_temp.into());
        out.insert(
            "performer_language".to_owned(),
            performer.language.as_str().into(),
        );
        out.insert(
            "performer_language_variant".to_owned(),
            performer.language_variant.clone().into(),
        );
        out.insert("performer_edit_count".to_owned(), performer.edit_count.into());
        out.insert(
            "performer_edit_count_bucket".to_owned(),
            performer
                .edit_count
                .filter(|_| performer.is_logged_in)
                .map(edit_count_bucket)
                .into(),
        );
        // An absent registration timestamp must be omitted entirely, or the event fails
        // validation downstream.
        out.insert(
            "performer_registration_dt".to_owned(),
            performer
                .registration_dt
                .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
                .into(),
        );
        out.insert(
            "performer_can_probably_edit_page".to_owned(),
            performer.can_probably_edit_page.into(),
        );
    }
}

/// Gets the coarse bucket corresponding to the user's edit count.
///
/// These buckets are the current standard but are subject to change in the future. They are
/// usually safe to keep in sanitized streams and should remain so even if they are changed.
pub fn edit_count_bucket(edit_count: i64) -> &'static str {
    if edit_count >= 1000 {
        "1000+ edits"
    } else if edit_count >= 100 {
        "100-999 edits"
    } else if edit_count >= 5 {
        "5-99 edits"
    } else if edit_count >= 1 {
        "1-4 edits"
    } else {
        "0 edits"
    }
}

/// A source of contextual attributes whose computation is worth memoizing.
pub trait ContextualAttributesSource {
    fn compute(&self) -> ContextualAttributes;
}

/// Resolves contextual attributes lazily, at most once per request.
pub trait ContextualAttributesProvider {
    /// Returns the contextual attributes for the current request, computing them on first call.
    fn contextual_attributes(&self) -> &ContextualAttributes;
}

/// Memoizing [`ContextualAttributesProvider`].
///
/// The underlying source is invoked only when the first event is created, i.e. if no events are
/// created during a request, no attribute values are retrieved at all.
pub struct CachedContextualAttributes<S> {
    source: S,
    cache: OnceLock<ContextualAttributes>,
}

impl<S: ContextualAttributesSource> CachedContextualAttributes<S> {
    pub fn new(source: S) -> CachedContextualAttributes<S> {
        CachedContextualAttributes {
            source,
            cache: OnceLock::new(),
        }
    }
}

impl<S: ContextualAttributesSource> ContextualAttributesProvider
    for CachedContextualAttributes<S>
{
    fn contextual_attributes(&self) -> &ContextualAttributes {
        self.cache.get_or_init(|| self.source.compute())
    }
}

/// [`ContextualAttributesSource`] backed by a request context.
pub struct RequestAttributesSource {
    factory: ContextualAttributesFactory,
    context: Arc<RequestContext>,
}

impl RequestAttributesSource {
    pub fn new(context: Arc<RequestContext>) -> RequestAttributesSource {
        RequestAttributesSource {
            factory: ContextualAttributesFactory,
            context,
        }
    }
}

impl ContextualAttributesSource for RequestAttributesSource {
    fn compute(&self) -> ContextualAttributes {
        self.factory.new_contextual_attributes(&self.context)
    }
}
