//! Interpreter performance benchmarks.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rbpf::Runtime;
use rbpf::bytecode::{BpfInsn, ImageBuilder, MemSize, Program};
use rbpf::execution::Vm;
use rbpf::verifier::Verifier;

/// Benchmark simple arithmetic program execution.
fn bench_arithmetic(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpreter/arithmetic");

    let image = ImageBuilder::new()
        .insn(BpfInsn::mov64_imm(0, 0)) // r0 = 0
        .insn(BpfInsn::mov64_imm(1, 100)) // r1 = 100
        .insn(BpfInsn::add64_reg(0, 1)) // r0 += r1
        .insn(BpfInsn::mul64_imm(0, 2)) // r0 *= 2
        .insn(BpfInsn::sub64_imm(0, 50)) // r0 -= 50
        .exit()
        .build()
        .expect("image fits");
    let runtime = Runtime::new();
    let mut vm = Vm::new(Program::parse(&image).expect("valid image"), &runtime);

    group.bench_function("simple_math", |b| b.iter(|| vm.execute(black_box(&mut [0u8; 0]))));

    group.finish();
}

/// Benchmark a counting loop; every iteration takes one branch.
fn bench_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpreter/loop");
    let runtime = Runtime::new();

    for iterations in [10, 100, 1000] {
        let image = ImageBuilder::new()
            .insn(BpfInsn::mov64_imm(0, 0)) // r0 = 0 (counter)
            .insn(BpfInsn::mov64_imm(1, iterations)) // r1 = iterations
            .insn(BpfInsn::add64_imm(0, 1)) // r0++
            .insn(BpfInsn::sub64_imm(1, 1)) // r1--
            .insn(BpfInsn::jne_imm(1, 0, -3)) // if r1 != 0, goto 2
            .exit()
            .build()
            .expect("image fits");
        let program = Program::parse(&image).expect("valid image");
        let mut vm = Vm::new(program, &runtime).branch_budget(u32::MAX);

        group.throughput(Throughput::Elements(iterations as u64));
        group.bench_with_input(
            BenchmarkId::new("iterations", iterations),
            &iterations,
            |b, _| b.iter(|| vm.execute(black_box(&mut [0u8; 0]))),
        );
    }

    group.finish();
}

/// Benchmark checked loads and stores on the stack and context.
fn bench_memory(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpreter/memory");

    let image = ImageBuilder::new()
        .insn(BpfInsn::ldx(MemSize::DWord, 2, 1, 0))
        .insn(BpfInsn::stx(MemSize::DWord, 10, 2, -8))
        .insn(BpfInsn::ldx(MemSize::Word, 0, 10, -8))
        .insn(BpfInsn::stx(MemSize::Word, 1, 0, 8))
        .exit()
        .build()
        .expect("image fits");
    let runtime = Runtime::new();
    let mut vm = Vm::new(Program::parse(&image).expect("valid image"), &runtime);
    let mut ctx = [0u8; 16];

    group.bench_function("load_store", |b| b.iter(|| vm.execute(black_box(&mut ctx))));

    group.finish();
}

/// Benchmark preflight on a long straight-line program.
fn bench_preflight(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpreter/preflight");
    let runtime = Runtime::new();

    let image = ImageBuilder::new()
        .insns((0..1000).map(|i| BpfInsn::add64_imm((i % 10) as u8, i)))
        .exit()
        .build()
        .expect("image fits");
    let program = Program::parse(&image).expect("valid image");

    group.throughput(Throughput::Elements(program.text().len() as u64));
    group.bench_function("straight_line_1000", |b| {
        b.iter(|| Verifier::new(runtime.calls()).verify(black_box(program.text())))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_arithmetic,
    bench_loop,
    bench_memory,
    bench_preflight,
);

criterion_main!(benches);
