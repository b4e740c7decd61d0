//! Shared fixtures: an in-memory library with one section, subsection and
//! student, plus helpers to add books and request loans.

#![allow(dead_code)]

use chrono::{Duration, Utc};

use biblio_server::{
    config::{AppConfig, LoanPolicy},
    models::{
        book::{Book, BookStatus},
        id::RecordId,
        loan::{CreateLoan, LoanDetails, LoanState},
        student::{Section, Student, Subsection},
    },
    repository::{BooksStore, LoansStore, MemoryStore, Repository},
    services::Services,
    AppState,
};

pub struct Library {
    pub store: MemoryStore,
    pub services: Services,
    pub section: Section,
    pub subsection: Subsection,
    pub student: Student,
}

impl Library {
    pub async fn new() -> Self {
        Self::with_policy(LoanPolicy::default()).await
    }

    pub async fn with_policy(policy: LoanPolicy) -> Self {
        let store = MemoryStore::new();

        let section = Section {
            id: RecordId::new(),
            name: "Bachillerato".into(),
        };
        let subsection = Subsection {
            id: RecordId::new(),
            name: "Quinto A".into(),
            section_id: section.id,
        };
        let student = student_in(&subsection, "Ana", "Pérez");

        store.insert_section(section.clone()).await;
        store.insert_subsection(subsection.clone()).await;
        store.insert_student(student.clone()).await;

        let services = Services::new(Repository::memory(store.clone()), policy);

        Self {
            store,
            services,
            section,
            subsection,
            student,
        }
    }

    /// App state over the same store, for router tests
    pub fn app_state(&self, config: AppConfig) -> AppState {
        AppState::new(config, Repository::memory(self.store.clone()))
    }

    pub async fn add_student(&self, first_name: &str, surname: &str) -> Student {
        let student = student_in(&self.subsection, first_name, surname);
        self.store.insert_student(student.clone()).await;
        student
    }

    pub async fn add_book(&self, title: &str, quantity: i32) -> Book {
        let now = Utc::now();
        let book = Book {
            id: RecordId::new(),
            title: title.into(),
            author: "Mario Vargas Llosa".into(),
            publisher: Some("Alfaguara".into()),
            description: None,
            quantity,
            cover_image: "https://img.example.org/cover.png".into(),
            status: BookStatus::Active,
            categories: vec![],
            created_at: now,
            updated_at: now,
        };
        BooksStore::insert(&self.store, &book).await.unwrap()
    }

    pub async fn quantity(&self, book_id: RecordId) -> i32 {
        BooksStore::get(&self.store, book_id)
            .await
            .unwrap()
            .unwrap()
            .quantity
    }

    /// Stored state of a loan, read without joining its book or student
    pub async fn loan_state(&self, loan_id: RecordId) -> LoanState {
        LoansStore::get(&self.store, loan_id)
            .await
            .unwrap()
            .unwrap()
            .state()
    }

    /// Request a loan of `quantity` copies for the fixture student
    pub async fn request_loan(&self, book: &Book, quantity: i32) -> LoanDetails {
        self.request_loan_for(book, &self.student, quantity).await
    }

    pub async fn request_loan_for(
        &self,
        book: &Book,
        student: &Student,
        quantity: i32,
    ) -> LoanDetails {
        self.services
            .loans
            .create_loan(loan_request(book.id, student.id, quantity))
            .await
            .unwrap()
    }
}

pub fn loan_request(book_id: RecordId, student_id: RecordId, quantity: i32) -> CreateLoan {
    let now = Utc::now();
    CreateLoan {
        book: Some(book_id.to_string()),
        student: Some(student_id.to_string()),
        quantity: Some(quantity),
        loan_date: Some(now),
        expect_return_date: Some(now + Duration::days(14)),
    }
}

fn student_in(subsection: &Subsection, first_name: &str, surname: &str) -> Student {
    Student {
        id: RecordId::new(),
        first_name: first_name.into(),
        second_name: None,
        third_name: None,
        first_surname: surname.into(),
        second_surname: None,
        number_phone: "+58 412 555 0101".into(),
        subsection_id: subsection.id,
    }
}
