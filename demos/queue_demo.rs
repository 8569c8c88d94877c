//! 排队叫号演示程序
//!
//! 展示完整的就诊流程：登记、分诊叫号、转诊到诊室、诊室叫号、完成接待，
//! 以及优先级排序和失约处理。

use std::sync::Arc;

use async_trait::async_trait;
use clinicq_core::{Announcer, CallAnnouncement, Priority, Result as ClinicResult, Station, StationKind};
use clinicq_queue::{OccupancyRegistry, PatientStore};
use clinicq_station::QueueEngine;

/// 打印到控制台的播报实现
struct ConsoleAnnouncer;

#[async_trait]
impl Announcer for ConsoleAnnouncer {
    async fn announce(&self, call: &CallAnnouncement) -> ClinicResult<()> {
        println!(
            "   📢 {}. Por favor, dirija-se à {}.",
            call.patient_name, call.station_display_name
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    println!("🏥 ClinicQ 排队叫号演示\n");

    // 1. 组装引擎：一个分诊台 + 两个诊室
    let store = Arc::new(PatientStore::new("demo-clinic"));
    let registry = Arc::new(OccupancyRegistry::new());
    let stations = vec![
        Station::new("triage", "Triagem", StationKind::Triage),
        Station::new("room-1", "Consultório 1", StationKind::Consultation),
        Station::new("room-2", "Consultório 2", StationKind::Consultation),
    ];
    let engine = QueueEngine::new(store, registry, Arc::new(ConsoleAnnouncer), stations);
    println!("✅ 队列引擎就绪（1个分诊台，2个诊室）");

    // 2. 登记患者，优先级不同
    let ana = engine.register("Ana Souza", Priority::Normal, None).await?;
    let bruno = engine.register("Bruno Lima", Priority::Emergency, None).await?;
    let clara = engine.register("Clara Dias", Priority::Priority, None).await?;
    println!("✅ 登记了 3 位患者");

    // 3. 分诊队列按优先级排序：急诊 > 优先 > 普通
    let waiting = engine.waiting_for("triage").await?;
    println!("\n📋 分诊等待队列:");
    for (i, p) in waiting.iter().enumerate() {
        println!("   {}. {} ({:?})", i + 1, p.name, p.priority);
    }

    // 4. 分诊叫号：急诊的Bruno先被叫到
    println!("\n🔔 分诊台叫号:");
    let called = engine.call("triage").await?;
    assert_eq!(called.id, bruno.id);

    // 5. 分诊完成，转诊到诊室1
    engine.finish("triage", bruno.id, Some("room-1")).await?;
    println!("   ✅ {} 分诊完成，转诊到诊室1", bruno.name);

    // 6. 诊室1叫号并重复播报
    println!("\n🔔 诊室1叫号:");
    engine.call("room-1").await?;
    engine.recall("room-1").await?;
    engine.finish("room-1", bruno.id, None).await?;
    println!("   ✅ {} 就诊完成", bruno.name);

    // 7. 下一位：Clara被分诊叫到但未到场
    engine.call("triage").await?;
    engine.no_show("triage", clara.id).await?;
    println!("\n⚠️  {} 未到场，标记失约", clara.name);

    // 8. Ana正常走完流程
    engine.call("triage").await?;
    engine.finish("triage", ana.id, Some("room-2")).await?;
    engine.call("room-2").await?;
    engine.finish("room-2", ana.id, None).await?;
    println!("✅ {} 就诊完成", ana.name);

    // 9. 系统概览
    let overview = engine.overview().await;
    println!("\n📊 系统概览:");
    println!("   患者总数: {}", overview.total_patients);
    println!("   已完成: {}", overview.attended);
    println!("   占用中的叫号位: {}", overview.occupied_slots);

    println!("\n🎉 演示完成");
    Ok(())
}
