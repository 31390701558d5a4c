use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        CreateMessageRequestArgs, CreateMessageRequestContent, CreateRunRequestArgs,
        CreateThreadRequestArgs, MessageContent, MessageObject, MessageRole, RunObject,
        RunStatus as ApiRunStatus, SubmitToolOutputsRunRequest, ToolsOutputsArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::info;

use crate::error::JobServiceError;
use crate::service::{
    JobHandle, JobService, RunState, RunStatus, ThreadMessage, ToolCallRequest, ToolCallResult,
};

/// Assistants API (threads / runs) backed job service.
pub struct OpenAiJobService {
    client: Client<OpenAIConfig>,
}

impl OpenAiJobService {
    pub fn new(api_key: &str) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        let client = Client::with_config(config);

        info!("Assistant service client ready");
        Self { client }
    }
}

fn map_err(e: OpenAIError) -> JobServiceError {
    match e {
        OpenAIError::Reqwest(e) => JobServiceError::Unavailable(e.to_string()),
        other => JobServiceError::Api(other.to_string()),
    }
}

fn map_status(status: &ApiRunStatus) -> RunStatus {
    match status {
        ApiRunStatus::Queued => RunStatus::Queued,
        ApiRunStatus::InProgress => RunStatus::InProgress,
        ApiRunStatus::RequiresAction => RunStatus::RequiresAction,
        ApiRunStatus::Cancelling => RunStatus::Cancelling,
        ApiRunStatus::Cancelled => RunStatus::Cancelled,
        ApiRunStatus::Failed => RunStatus::Failed,
        ApiRunStatus::Completed => RunStatus::Completed,
        ApiRunStatus::Expired => RunStatus::Expired,
        ApiRunStatus::Incomplete => RunStatus::Incomplete,
    }
}

fn run_state(run: &RunObject) -> RunState {
    let status = map_status(&run.status);
    let tool_calls = match (&status, &run.required_action) {
        (RunStatus::RequiresAction, Some(action)) => action
            .submit_tool_outputs
            .tool_calls
            .iter()
            .map(|call| ToolCallRequest {
                call_id: call.id.clone(),
                function_name: call.function.name.clone(),
                raw_arguments: call.function.arguments.clone(),
            })
            .collect(),
        _ => Vec::new(),
    };
    RunState { status, tool_calls }
}

fn thread_message(message: &MessageObject) -> ThreadMessage {
    let text = message
        .content
        .iter()
        .filter_map(|content| match content {
            MessageContent::Text(text) => Some(text.text.value.clone()),
            _ => None,
        })
        .collect();
    ThreadMessage { id: message.id.clone(), text }
}

#[async_trait]
impl JobService for OpenAiJobService {
    async fn create_thread(&self) -> Result<String, JobServiceError> {
        let request = CreateThreadRequestArgs::default().build().map_err(map_err)?;
        let thread = self.client.threads().create(request).await.map_err(map_err)?;
        Ok(thread.id)
    }

    async fn add_user_message(&self, thread_id: &str, text: &str) -> Result<String, JobServiceError> {
        let request = CreateMessageRequestArgs::default()
            .role(MessageRole::User)
            .content(CreateMessageRequestContent::Content(text.to_string()))
            .build()
            .map_err(map_err)?;
        let message = self
            .client
            .threads()
            .messages(thread_id)
            .create(request)
            .await
            .map_err(map_err)?;
        Ok(message.id)
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<String, JobServiceError> {
        let request = CreateRunRequestArgs::default()
            .assistant_id(assistant_id)
            .build()
            .map_err(map_err)?;
        let run = self
            .client
            .threads()
            .runs(thread_id)
            .create(request)
            .await
            .map_err(map_err)?;
        Ok(run.id)
    }

    async fn get_run_status(&self, handle: &JobHandle) -> Result<RunState, JobServiceError> {
        let run = self
            .client
            .threads()
            .runs(&handle.thread_id)
            .retrieve(&handle.run_id)
            .await
            .map_err(map_err)?;
        Ok(run_state(&run))
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, JobServiceError> {
        let page = self
            .client
            .threads()
            .messages(thread_id)
            .list(&[("order", "desc")])
            .await
            .map_err(map_err)?;
        Ok(page.data.iter().map(thread_message).collect())
    }

    async fn submit_tool_outputs(
        &self,
        handle: &JobHandle,
        results: Vec<ToolCallResult>,
    ) -> Result<(), JobServiceError> {
        let tool_outputs = results
            .into_iter()
            .map(|result| {
                ToolsOutputsArgs::default()
                    .tool_call_id(result.call_id)
                    .output(result.output)
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;

        let request = SubmitToolOutputsRunRequest { tool_outputs, stream: None };

        self.client
            .threads()
            .runs(&handle.thread_id)
            .submit_tool_outputs(&handle.run_id, request)
            .await
            .map_err(map_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_acted_on_status() {
        assert_eq!(map_status(&ApiRunStatus::Completed), RunStatus::Completed);
        assert_eq!(map_status(&ApiRunStatus::RequiresAction), RunStatus::RequiresAction);
        assert_eq!(map_status(&ApiRunStatus::Failed), RunStatus::Failed);
        assert_eq!(map_status(&ApiRunStatus::InProgress), RunStatus::InProgress);
        assert_eq!(map_status(&ApiRunStatus::Incomplete), RunStatus::Incomplete);
        assert_eq!(map_status(&ApiRunStatus::Expired), RunStatus::Expired);
    }

    #[test]
    fn invalid_argument_is_an_api_error() {
        let err = map_err(OpenAIError::InvalidArgument("bad".into()));
        assert!(matches!(err, JobServiceError::Api(ref message) if message.contains("bad")));
    }
}
