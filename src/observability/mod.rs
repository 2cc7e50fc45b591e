// Observability: conversion metrics

pub mod metrics;
