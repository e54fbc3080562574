//! Deskhand 控制台前端
//!
//! 读取一行输入 -> 交给后台 worker -> 打印回复；`exit` / `quit` 退出，`/clear` 清空对话。
//! Ctrl+C 在回合进行中取消当前回合，在输入提示处退出。

use std::io::Write;

use anyhow::Context;
use deskhand::config::load_config;
use deskhand::react::LoopEvent;
use deskhand::{observability, spawn_worker, AgentBuilder, AgentHandle, Command, TurnReply};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

type Input = Lines<BufReader<Stdin>>;

fn prompt(label: &str) {
    print!("{label}");
    let _ = std::io::stdout().flush();
}

/// 等待当前回合结束，期间展示过程事件；Ctrl+C 转为 Cancel
async fn await_reply(handle: &mut AgentHandle) -> Option<TurnReply> {
    loop {
        tokio::select! {
            reply = handle.reply_rx.recv() => return reply,
            Some(event) = handle.event_rx.recv() => match event {
                LoopEvent::ThinkingStarted => println!("Thinking..."),
                LoopEvent::ActionCall { name, .. } => println!("  -> {name}"),
                LoopEvent::ActionResult { name, ok, .. } => {
                    println!("  <- {name} ({})", if ok { "ok" } else { "failed" })
                }
                LoopEvent::ThinkingFinished | LoopEvent::Error { .. } => {}
            },
            _ = tokio::signal::ctrl_c() => {
                let _ = handle.cmd_tx.send(Command::Cancel);
            }
        }
    }
}

/// 打印回复；若带后续动作提议则询问用户，接受时继续执行
async fn show_reply(handle: &mut AgentHandle, input: &mut Input, mut reply: TurnReply) -> anyhow::Result<()> {
    loop {
        println!("Assistant: {}", reply.text);
        let Some(offer) = reply.offer.take() else {
            return Ok(());
        };

        prompt(&format!("{} (yes/no): ", offer.prompt));
        let answer = input.next_line().await?.unwrap_or_default();
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            return Ok(());
        }
        handle.cmd_tx.send(Command::AcceptOffer(offer)).context("worker stopped")?;
        reply = match await_reply(handle).await {
            Some(r) => r,
            None => return Ok(()),
        };
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        Default::default()
    });
    let name = cfg.app.name.clone().unwrap_or_else(|| "Deskhand".to_string());

    let orchestrator = AgentBuilder::new(cfg).build().context("Failed to build agent")?;
    let mut handle = spawn_worker(orchestrator);

    println!("Welcome to {name}! Type 'exit' or 'quit' to leave, '/clear' to start over.");
    println!("Press Ctrl+C to cancel a running request, or at the prompt to leave.");
    let mut input: Input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt("You: ");
        // 空闲时 Ctrl+C 退出；回合进行中的 Ctrl+C 由 await_reply 转为 Cancel
        let line = tokio::select! {
            line = input.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                None
            }
        };
        let Some(line) = line else {
            println!("Goodbye!");
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            println!("Goodbye!");
            break;
        }
        if line == "/clear" {
            handle.cmd_tx.send(Command::Clear).context("worker stopped")?;
            println!("Conversation cleared.");
            continue;
        }

        handle
            .cmd_tx
            .send(Command::Submit(line.to_string()))
            .context("worker stopped")?;
        match await_reply(&mut handle).await {
            Some(reply) => show_reply(&mut handle, &mut input, reply).await?,
            None => break,
        }
    }

    let _ = handle.cmd_tx.send(Command::Quit);
    let _ = handle.task.await;
    Ok(())
}
