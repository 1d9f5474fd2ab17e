//! The fixture harvesting session.
//!
//! A session authenticates, seeds the remote account with fake content,
//! calls every read endpoint once the content exists and records each
//! response as a fixture. Whatever was created is torn down afterwards,
//! even when the run failed.

use crate::cleanup::{settle, CleanupCoordinator};
use crate::config::{Config, FakeEntities};
use crate::core::dag::TaskGraph;
use crate::core::store::{ResultStore, TaskInputs};
use crate::core::task::TaskSpec;
use crate::endpoint::{EndpointAdapter, Operation, SubOperation};
use crate::error::{Error, Result};
use crate::orchestration::GraphExecutor;
use crate::recorder::MockRecorder;
use crate::{hlog, hlog_debug};
use futures::future::{join_all, try_join_all};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

/// Every operation a session invokes, checked before the first call.
pub const REQUIRED_OPERATIONS: &[Operation] = &Operation::ALL;

/// Sub-operations of `getDocumentsById` harvested after the document exists.
pub const DOCUMENT_SUB_OPERATIONS: &[SubOperation] = &SubOperation::ALL;

/// Barrier task completing once the fake content exists.
pub const SEEDED: &str = "seeded";

const USERS_TASK: &str = "postUsers";
const SUBCOMPANY_TASK: &str = "postSubcompanies";
const DOCUMENT_TASK: &str = "postDocuments";
const USER_TASK: &str = "getUser";

/// Where a read endpoint takes its positional argument from.
#[derive(Debug, Clone)]
enum ArgSource {
    None,
    /// The `id` field of a dependency's value.
    IdOf(&'static str),
    Fixed(Value),
}

impl ArgSource {
    fn dependency(&self) -> Option<&'static str> {
        match self {
            ArgSource::IdOf(dep) => Some(*dep),
            _ => None,
        }
    }

    fn resolve(&self, task: &str, inputs: &TaskInputs<Value>) -> Result<Vec<Value>> {
        match self {
            ArgSource::None => Ok(Vec::new()),
            ArgSource::Fixed(value) => Ok(vec![value.clone()]),
            ArgSource::IdOf(dep) => {
                let body = inputs.require(task, dep)?;
                let id = id_of(body).ok_or_else(|| Error::MissingValue {
                    task: task.to_string(),
                    detail: format!("{} returned no id", dep),
                })?;
                Ok(vec![id])
            }
        }
    }
}

/// The `id` field of a response body, when present and not null.
pub fn id_of(body: &Value) -> Option<Value> {
    body.get("id").filter(|id| !id.is_null()).cloned()
}

/// `template` with a random suffix before the `@`, so each user is new.
pub fn unique_email(template: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let suffix = &suffix[..8];
    match template.split_once('@') {
        Some((local, domain)) => format!("{}-{}@{}", local, suffix, domain),
        None => format!("{}-{}@norris.com", template, suffix),
    }
}

/// Identifiers of remote resources created during a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapturedIds {
    pub subcompany_id: Option<Value>,
    pub document_identifier: String,
    pub extra_user_ids: Vec<Value>,
}

impl CapturedIds {
    /// Collect identifiers from the (possibly partial) result store.
    pub fn from_store(store: &ResultStore<Value>, document_identifier: &str) -> Self {
        let subcompany_id = store.get(SUBCOMPANY_TASK).and_then(id_of);
        let extra_user_ids = store
            .get(USERS_TASK)
            .and_then(|users| users.get("extra"))
            .and_then(Value::as_array)
            .map(|extra| extra.iter().filter_map(id_of).collect())
            .unwrap_or_default();

        Self {
            subcompany_id,
            document_identifier: document_identifier.to_string(),
            extra_user_ids,
        }
    }
}

/// What a finished session produced.
#[derive(Debug, Clone, Default)]
pub struct HarvestSummary {
    /// Fixture files written, in write order.
    pub fixtures: Vec<PathBuf>,
    /// Number of remote operations that completed, the `seeded` barrier excluded.
    pub operations_completed: usize,
    /// Cleanup actions that succeeded.
    pub cleaned: Vec<String>,
}

/// Shared handles cloned into every task closure.
#[derive(Clone)]
struct TaskContext {
    adapter: Arc<EndpointAdapter>,
    recorder: Arc<MockRecorder>,
}

impl TaskContext {
    /// Invoke `op` and record its response.
    async fn mock(&self, op: Operation, args: Vec<Value>) -> Result<Value> {
        let invocation = self.adapter.invoke(op, args).await?;
        self.recorder
            .record(&invocation.descriptor, invocation.body())
            .await?;
        Ok(invocation.into_body())
    }

    async fn mock_sub(
        &self,
        parent: Operation,
        args: Vec<Value>,
        sub: SubOperation,
    ) -> Result<Value> {
        let invocation = self.adapter.invoke_sub(parent, args, sub).await?;
        self.recorder
            .record(&invocation.descriptor, invocation.body())
            .await?;
        Ok(invocation.into_body())
    }

    /// Invoke a creation `op`; the response is recorded only when it carries an id.
    async fn create(&self, op: Operation, payload: Value) -> Result<Value> {
        let invocation = self.adapter.invoke(op, vec![payload]).await?;
        if id_of(invocation.body()).is_some() {
            self.recorder
                .record(&invocation.descriptor, invocation.body())
                .await?;
        }
        Ok(invocation.into_body())
    }

    /// Create `count` users concurrently, each with a fresh e-mail.
    ///
    /// The first user is recorded and returned as `chuck`; the others are
    /// returned as `extra` so cleanup can delete them.
    async fn create_users(&self, template: Value, count: usize) -> Result<Value> {
        let email = template
            .get("email")
            .and_then(Value::as_str)
            .unwrap_or("thechuck@norris.com")
            .to_string();

        let calls = (0..count).map(|_| {
            let mut user = template.clone();
            if let Some(fields) = user.as_object_mut() {
                fields.insert("email".to_string(), Value::String(unique_email(&email)));
            }
            self.adapter.invoke(Operation::PostUsers, vec![user])
        });
        let mut created = try_join_all(calls).await?.into_iter();

        let chuck = match created.next() {
            Some(first) => {
                if id_of(first.body()).is_some() {
                    self.recorder.record(&first.descriptor, first.body()).await?;
                }
                first.into_body()
            }
            None => Value::Null,
        };
        let extra: Vec<Value> = created.map(|user| user.into_body()).collect();
        hlog_debug!("Created {} users", extra.len() + usize::from(!chuck.is_null()));

        Ok(json!({ "chuck": chuck, "extra": extra }))
    }
}

/// A harvesting run against one API account.
pub struct HarvestSession {
    adapter: Arc<EndpointAdapter>,
    recorder: Arc<MockRecorder>,
    fakes: FakeEntities,
    user_count: usize,
    max_in_flight: Option<usize>,
}

impl HarvestSession {
    pub fn new(adapter: EndpointAdapter, recorder: MockRecorder, config: &Config) -> Self {
        Self {
            adapter: Arc::new(adapter),
            recorder: Arc::new(recorder),
            fakes: config.fake.clone(),
            user_count: config.user_count,
            max_in_flight: config.max_in_flight,
        }
    }

    fn context(&self) -> TaskContext {
        TaskContext {
            adapter: self.adapter.clone(),
            recorder: self.recorder.clone(),
        }
    }

    fn document_identifier(&self) -> Result<String> {
        self.fakes
            .document_identifier()
            .map(str::to_string)
            .ok_or_else(|| Error::Config("the fake document has no identifier".to_string()))
    }

    /// Check every operation against the catalog and build the graph.
    ///
    /// Nothing is called remotely; errors here mean the run cannot start.
    pub fn validate(&self) -> Result<TaskGraph<Value>> {
        self.adapter.resolve_all(REQUIRED_OPERATIONS)?;
        for sub in DOCUMENT_SUB_OPERATIONS {
            self.adapter
                .catalog()
                .sub_descriptor(Operation::GetDocumentsById, *sub)?;
        }
        self.plan()
    }

    /// The task graph of a session.
    pub fn plan(&self) -> Result<TaskGraph<Value>> {
        let identifier = self.document_identifier()?;
        let ctx = self.context();

        let mut builder = TaskGraph::<Value>::builder();

        let c = ctx.clone();
        builder = builder.task(USER_TASK, &[], move |_| {
            let c = c.clone();
            async move { c.mock(Operation::GetUser, Vec::new()).await }
        });

        let c = ctx.clone();
        let user = self.fakes.user.clone();
        let count = self.user_count;
        builder = builder.task(USERS_TASK, &[], move |_| {
            let c = c.clone();
            let user = user.clone();
            async move { c.create_users(user, count).await }
        });

        let c = ctx.clone();
        let company = self.fakes.company.clone();
        builder = builder.task(SUBCOMPANY_TASK, &[USERS_TASK], move |inputs| {
            let c = c.clone();
            let company = company.clone();
            async move {
                let users = inputs.require(SUBCOMPANY_TASK, USERS_TASK)?;
                let admin = users.get("chuck").and_then(id_of).ok_or_else(|| {
                    Error::MissingValue {
                        task: SUBCOMPANY_TASK.to_string(),
                        detail: "no admin user was created".to_string(),
                    }
                })?;
                let mut subcompany = company;
                if let Some(fields) = subcompany.as_object_mut() {
                    fields.insert("user".to_string(), admin);
                }
                c.create(Operation::PostSubcompanies, subcompany).await
            }
        });

        let c = ctx.clone();
        let document = self.fakes.document.clone();
        builder = builder.task(DOCUMENT_TASK, &[], move |_| {
            let c = c.clone();
            let document = document.clone();
            async move { c.create(Operation::PostDocuments, document).await }
        });

        builder = builder.task(
            SEEDED,
            &[USER_TASK, SUBCOMPANY_TASK, DOCUMENT_TASK],
            |_| async { Ok(Value::Null) },
        );

        let reads = [
            (Operation::GetDocuments, ArgSource::None),
            (Operation::GetStatus, ArgSource::None),
            (Operation::GetIndex, ArgSource::None),
            (Operation::GetCompany, ArgSource::None),
            (Operation::GetSubcompanies, ArgSource::None),
            (Operation::PostCompanyUpdate, ArgSource::None),
            (Operation::GetUsers, ArgSource::None),
            (Operation::GetDocumentTypes, ArgSource::None),
            (Operation::GetProviders, ArgSource::None),
            (Operation::GetSubcompaniesById, ArgSource::IdOf(SUBCOMPANY_TASK)),
            (Operation::GetDocumentsById, ArgSource::IdOf(DOCUMENT_TASK)),
            (
                Operation::GetDocumentsByIdentifier,
                ArgSource::Fixed(Value::String(identifier)),
            ),
            (Operation::GetUsersById, ArgSource::IdOf(USER_TASK)),
        ];
        for (op, source) in reads {
            builder = builder.spec(read_task(&ctx, op, source));
        }

        for sub in DOCUMENT_SUB_OPERATIONS {
            builder = builder.spec(sub_task(&ctx, *sub));
        }

        builder.build()
    }

    /// Fetch a token with the basic credentials and switch the client to it.
    pub async fn authenticate(&self) -> Result<()> {
        let body = self.context().mock(Operation::GetToken, Vec::new()).await?;
        let token = body
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MissingValue {
                task: Operation::GetToken.to_string(),
                detail: "the response carries no token".to_string(),
            })?;
        self.adapter.client().authorize(token);
        hlog!("Authenticated");
        Ok(())
    }

    /// Teardown of everything a run may have created.
    pub fn cleanup_set(&self) -> CleanupCoordinator<CapturedIds> {
        let adapter = self.adapter.clone();
        let subcompany = move |ids: Arc<CapturedIds>| {
            let adapter = adapter.clone();
            async move {
                let Some(id) = ids.subcompany_id.clone() else {
                    hlog_debug!("No subcompany was created, nothing to delete");
                    return Ok::<(), Error>(());
                };
                // Deleting the subcompany also deletes its admin user.
                adapter
                    .invoke(Operation::DeleteSubcompanyById, vec![id, json!({})])
                    .await?;
                Ok(())
            }
        };

        let adapter = self.adapter.clone();
        let document = move |ids: Arc<CapturedIds>| {
            let adapter = adapter.clone();
            async move {
                adapter
                    .invoke(
                        Operation::DeleteDocumentsByIdentifier,
                        vec![Value::String(ids.document_identifier.clone())],
                    )
                    .await?;
                Ok::<(), Error>(())
            }
        };

        let adapter = self.adapter.clone();
        let users = move |ids: Arc<CapturedIds>| {
            let adapter = adapter.clone();
            async move {
                let deletions = ids
                    .extra_user_ids
                    .iter()
                    .map(|id| adapter.invoke(Operation::DeleteUserById, vec![id.clone()]));
                join_all(deletions)
                    .await
                    .into_iter()
                    .collect::<Result<Vec<_>>>()?;
                Ok::<(), Error>(())
            }
        };

        CleanupCoordinator::new()
            .action("deleteSubcompanyById", subcompany)
            .action("deleteDocumentsByIdentifier", document)
            .action("deleteUsers", users)
    }

    /// Run the whole session: validate, authenticate, harvest, clean up.
    pub async fn run(&self) -> Result<HarvestSummary> {
        let graph = self.validate()?;
        let identifier = self.document_identifier()?;

        self.recorder.ensure_dir().await?;
        self.authenticate().await?;

        hlog!("Running {} tasks", graph.task_count());
        let mut executor = GraphExecutor::new(graph);
        if let Some(max) = self.max_in_flight {
            executor = executor.with_max_in_flight(max);
        }
        let outcome = executor.run().await;

        let captured = CapturedIds::from_store(outcome.store(), &identifier);
        hlog_debug!("Captured for cleanup: {:?}", captured);
        let report = self.cleanup_set().run(captured).await;
        let cleaned = report.succeeded.clone();

        let store = settle(outcome, report)?;
        let summary = HarvestSummary {
            fixtures: self.recorder.written(),
            operations_completed: operations_completed(&store),
            cleaned,
        };
        hlog!(
            "Harvest done: {} fixtures, {} operations",
            summary.fixtures.len(),
            summary.operations_completed
        );
        Ok(summary)
    }
}

/// Completed tasks that stand for a remote call.
fn operations_completed(store: &ResultStore<Value>) -> usize {
    store.names().into_iter().filter(|name| *name != SEEDED).count()
}

fn read_task(ctx: &TaskContext, op: Operation, source: ArgSource) -> TaskSpec<Value> {
    let mut deps = vec![SEEDED];
    deps.extend(source.dependency());

    let ctx = ctx.clone();
    let task = op.as_str();
    TaskSpec::new(task, &deps, move |inputs| {
        let ctx = ctx.clone();
        let args = source.resolve(task, &inputs);
        async move { ctx.mock(op, args?).await }
    })
}

fn sub_task(ctx: &TaskContext, sub: SubOperation) -> TaskSpec<Value> {
    let parent = Operation::GetDocumentsById;
    let ctx = ctx.clone();
    let task = sub.as_str();
    TaskSpec::new(task, &[parent.as_str(), DOCUMENT_TASK], move |inputs| {
        let ctx = ctx.clone();
        let args = ArgSource::IdOf(DOCUMENT_TASK).resolve(task, &inputs);
        async move { ctx.mock_sub(parent, args?, sub).await }
    })
}
