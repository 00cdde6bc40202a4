//! Interactive loop driving one session through the runtime controller.

use callboard_runtime::{ModelProvider, RuntimeController, SessionStore, TurnOptions};
use std::io::{self, Write};

pub struct Repl<S, P>
where
    S: SessionStore,
    P: ModelProvider,
{
    controller: RuntimeController<S, P>,
    session_id: String,
    user_id: String,
    workflow: String,
    initial_agent: String,
    options: TurnOptions,
}

impl<S, P> Repl<S, P>
where
    S: SessionStore,
    P: ModelProvider,
{
    pub fn new(
        controller: RuntimeController<S, P>,
        session_id: String,
        user_id: String,
        workflow: String,
        initial_agent: String,
        options: TurnOptions,
    ) -> Self {
        Self {
            controller,
            session_id,
            user_id,
            workflow,
            initial_agent,
            options,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        println!("Callboard orchestration REPL");
        println!("Commands: exit, help, status, new, clear");
        println!();

        loop {
            print!("callboard> ");
            io::stdout().flush()?;

            let mut input = String::new();
            if io::stdin().read_line(&mut input)? == 0 {
                break;
            }
            let input = input.trim();
            if input.is_empty() {
                continue;
            }

            match input {
                "exit" | "quit" => break,
                "help" => {
                    println!("  exit, quit  - Leave the REPL");
                    println!("  status      - Show the current session");
                    println!("  new         - Start a fresh session");
                    println!("  clear       - Delete the current session and start over");
                    println!("  anything else is sent to the current agent\n");
                    continue;
                }
                "status" => {
                    self.print_status().await;
                    continue;
                }
                "new" => {
                    self.start_session().await?;
                    continue;
                }
                "clear" => {
                    self.controller
                        .engine()
                        .delete_session(&self.session_id)
                        .await?;
                    self.start_session().await?;
                    continue;
                }
                _ => {}
            }

            match self
                .controller
                .execute(&self.session_id, input, self.options)
                .await
            {
                Ok(outcome) => {
                    for handoff in &outcome.handoffs_performed {
                        println!("[{} -> {}: {}]", handoff.source, handoff.target, handoff.reason);
                    }
                    match &outcome.final_output {
                        serde_json::Value::String(text) => println!("\n{}\n", text),
                        other => println!("\n{:#}\n", other),
                    }
                }
                Err(e) if e.is_retryable() => eprintln!("Error (retryable): {}\n", e),
                Err(e) => eprintln!("Error: {}\n", e),
            }
        }

        Ok(())
    }

    async fn start_session(&mut self) -> anyhow::Result<()> {
        self.session_id = self
            .controller
            .engine()
            .create_session(&self.user_id, &self.workflow, self.initial_agent.as_str())
            .await?;
        println!("Started session {}\n", self.session_id);
        Ok(())
    }

    async fn print_status(&self) {
        match self.controller.engine().get_session(&self.session_id).await {
            Ok(session) => {
                println!("  Session:  {}", session.id);
                println!("  Agent:    {}", session.current_agent);
                println!("  Workflow: {}", session.workflow);
                println!("  Messages: {}", session.history.len());
                println!("  Context:  {}\n", serde_json::Value::Object(session.context));
            }
            Err(e) => eprintln!("  {}\n", e),
        }
    }
}
