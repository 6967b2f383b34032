//! The lookup session owns everything that outlives a single invocation: the
//! service client, the prepared statement record and the compiled attribute
//! specs. Each is rebuilt only when the options it derives from change.

use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use qlookup_core::config::{ConnectionSettings, LookupOptions};
use qlookup_core::error::{Error, ErrorPayload, Result, ServiceError};
use qlookup_core::traits::{QueryService, ServiceFactory};
use qlookup_core::types::Entity;
use qlookup_format::Projector;
use qlookup_query::{bind_all, parse_template, ParsedTemplate, PollPolicy, PreparedStatementManager, QueryRunner};

use crate::message::InboundMessage;
use crate::result::{format_outcome, EntityLookup, EntityResult, ResultData};

struct Client {
    settings: ConnectionSettings,
    service: Arc<dyn QueryService>,
}

pub struct LookupSession {
    factory: Arc<dyn ServiceFactory>,
    client: Option<Client>,
    scope: String,
    statements: PreparedStatementManager,
    projector: Projector,
}

impl LookupSession {
    pub fn new(factory: Arc<dyn ServiceFactory>) -> Self {
        let scope = LookupOptions::default().statement_scope;
        Self {
            factory,
            client: None,
            statements: PreparedStatementManager::new(&scope),
            scope,
            projector: Projector::default(),
        }
    }

    pub fn projector(&self) -> &Projector { &self.projector }

    /// Name of the remote prepared statement this session maintains.
    pub fn statement_name(&self) -> &str { self.statements.name() }

    /// Runs the configured query once per entity.
    ///
    /// At most `max_concurrency` executions are in flight and results keep the
    /// input order. The first failing entity fails the whole call and no
    /// partial results are returned; see [`LookupSession::lookup_isolated`].
    pub async fn lookup(&mut self, entities: &[Entity], options: &LookupOptions) -> Result<Vec<EntityResult>> {
        let (service, template) = self.begin(entities, options).await?;
        let session: &Self = self;
        let service: &dyn QueryService = service.as_ref();
        let template = &template;

        stream::iter(entities)
            .map(move |entity| async move {
                let data = session.lookup_entity(service, template, entity, options).await?;
                Ok::<_, Error>(EntityResult { entity: entity.clone(), data })
            })
            .buffered(options.max_concurrency)
            .try_collect()
            .await
    }

    /// Like [`LookupSession::lookup`], but a failing entity only fails its
    /// own slot. Errors that affect every entity still fail the call.
    pub async fn lookup_isolated(&mut self, entities: &[Entity], options: &LookupOptions) -> Result<Vec<EntityLookup>> {
        let (service, template) = self.begin(entities, options).await?;
        let session: &Self = self;
        let service: &dyn QueryService = service.as_ref();
        let template = &template;

        let results: Vec<EntityLookup> = stream::iter(entities)
            .map(move |entity| async move {
                let result = session.lookup_entity(service, template, entity, options).await.map_err(|e| {
                    warn!(entity = %entity.value, error = %e, "entity lookup failed");
                    ErrorPayload::from(e)
                });
                EntityLookup { entity: entity.clone(), result }
            })
            .buffered(options.max_concurrency)
            .collect()
            .await;
        Ok(results)
    }

    /// Checks a previously suspended execution once and formats it exactly as
    /// a fresh lookup would.
    pub async fn resume_by_handle(&mut self, handle: &str, options: &LookupOptions) -> Result<Option<ResultData>> {
        let service = self.prepare(options)?;
        let runner = QueryRunner::new(service.as_ref(), options.row_limit, PollPolicy::from_options(options));
        let outcome = runner.resume(handle.to_string()).await?;
        debug!(handle, "resumed query execution");
        format_outcome(&self.projector, outcome)
    }

    /// Routes a host message. The reply is the formatted result as JSON, or a
    /// flat error payload.
    pub async fn handle_message(&mut self, message: &Value, options: &LookupOptions) -> std::result::Result<Value, ErrorPayload> {
        let reply = match self.dispatch(message, options).await {
            Ok(data) => serde_json::to_value(data)
                .map_err(|e| Error::InvalidMessage(format!("reply could not be serialized: {e}"))),
            Err(e) => Err(e),
        };
        reply.map_err(|e| {
            warn!(error = %e, "message handling failed");
            ErrorPayload::from(e)
        })
    }

    async fn dispatch(&mut self, message: &Value, options: &LookupOptions) -> Result<Option<ResultData>> {
        match InboundMessage::parse(message)? {
            InboundMessage::CheckQueryStatus { execution_id } => self.resume_by_handle(&execution_id, options).await,
        }
    }

    /// Shared preamble of both lookup modes: sync session state and make sure
    /// the prepared statement is current, once for the whole batch.
    async fn begin(&mut self, entities: &[Entity], options: &LookupOptions) -> Result<(Arc<dyn QueryService>, ParsedTemplate)> {
        let service = self.prepare(options)?;
        let template = parse_template(&options.query);
        info!(
            entities = entities.len(),
            placeholders = template.placeholder_count(),
            max_concurrency = options.max_concurrency,
            "starting lookup"
        );
        if template.is_parameterized() && !entities.is_empty() {
            self.statements.ensure(service.as_ref(), &options.workgroup, &template.canonical).await?;
        }
        Ok((service, template))
    }

    fn prepare(&mut self, options: &LookupOptions) -> Result<Arc<dyn QueryService>> {
        options.validate()?;

        if options.statement_scope != self.scope {
            info!(scope = %options.statement_scope, "statement scope changed");
            self.scope = options.statement_scope.clone();
            self.statements = PreparedStatementManager::new(&self.scope);
        }

        let settings = options.connection();
        let current = self.client.as_ref().filter(|c| c.settings == settings).map(|c| c.service.clone());
        let service = match current {
            Some(service) => service,
            None => {
                let service = self
                    .factory
                    .connect(&settings)
                    .map_err(|e| Error::Service(ServiceError::new("ClientInitializationError", e.to_string())))?;
                info!(region = %settings.region, endpoint = ?settings.endpoint, "built query service client");
                self.statements.invalidate();
                self.client = Some(Client { settings, service: service.clone() });
                service
            }
        };

        self.projector.refresh(options);
        Ok(service)
    }

    async fn lookup_entity(
        &self,
        service: &dyn QueryService,
        template: &ParsedTemplate,
        entity: &Entity,
        options: &LookupOptions,
    ) -> Result<Option<ResultData>> {
        let query = if template.is_parameterized() {
            let literals = bind_all(&entity.value, &template.hints)?;
            self.statements.execute_statement(&literals)
        } else {
            template.canonical.clone()
        };
        debug!(entity = %entity.value, "running entity query");
        let runner = QueryRunner::new(service, options.row_limit, PollPolicy::from_options(options));
        let outcome = runner.run(query, &options.workgroup, options.output_location()).await?;
        format_outcome(&self.projector, outcome)
    }
}
