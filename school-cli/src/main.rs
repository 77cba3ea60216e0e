use std::sync::Arc;

use clap::Parser;
use school_accounts::infrastructure::config::AppConfig;
use school_accounts::infrastructure::database::{create_pool, run_migrations};
use school_accounts::infrastructure::logging::init_logging;
use school_accounts::{
    NewUser, PostgresUserRepository, RelationLookup, Relations, User, UserChanges, UserService,
};
use uuid::Uuid;

#[derive(Parser, Debug)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Parser, Debug)]
enum Command {
    CreateUser {
        #[clap(long)]
        email: String,
        #[clap(long)]
        password: String,
        #[clap(long)]
        name: String,
        #[clap(long)]
        role: String,
        #[clap(long)]
        avatar: Option<String>,
        #[clap(long)]
        class_id: Option<Uuid>,
        #[clap(long)]
        teacher_id: Option<Uuid>,
        #[clap(long)]
        parent_id: Option<Uuid>,
        #[clap(long = "student-id")]
        student_ids: Vec<Uuid>,
        #[clap(long = "class-ids")]
        class_ids: Vec<Uuid>,
    },
    UpdateUser {
        id: Uuid,
        #[clap(long)]
        email: Option<String>,
        #[clap(long)]
        name: Option<String>,
        #[clap(long)]
        role: Option<String>,
        #[clap(long)]
        avatar: Option<String>,
        #[clap(long)]
        class_id: Option<Uuid>,
        #[clap(long)]
        teacher_id: Option<Uuid>,
        #[clap(long)]
        parent_id: Option<Uuid>,
        #[clap(long = "student-id")]
        student_ids: Option<Vec<Uuid>>,
        #[clap(long = "class-ids")]
        class_ids: Option<Vec<Uuid>>,
    },
    SetPassword {
        id: Uuid,
        #[clap(long)]
        password: String,
    },
    Verify {
        #[clap(long)]
        email: String,
        #[clap(long)]
        password: String,
    },
    Show {
        #[clap(long)]
        email: String,
    },
    Students {
        id: Uuid,
    },
    Delete {
        id: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Cli::parse();

    let config = AppConfig::from_env()?;
    let pool = create_pool(&config.database_url, config.database_max_connections).await?;
    run_migrations(&pool).await?;

    let repo = Arc::new(PostgresUserRepository::new(pool));
    let users = UserService::new(Arc::clone(&repo), config.hashing());
    let relations = RelationLookup::new(repo);

    match args.command {
        Command::CreateUser {
            email,
            password,
            name,
            role,
            avatar,
            class_id,
            teacher_id,
            parent_id,
            student_ids,
            class_ids,
        } => {
            let user = users
                .create_user(NewUser {
                    email,
                    password,
                    name,
                    role,
                    avatar,
                    relations: Relations {
                        class_id,
                        teacher_id,
                        parent_id,
                        student_ids,
                        class_ids,
                    },
                })
                .await?;
            println!("User created! ID: {}", user.id);
        }
        Command::UpdateUser {
            id,
            email,
            name,
            role,
            avatar,
            class_id,
            teacher_id,
            parent_id,
            student_ids,
            class_ids,
        } => {
            let changes = UserChanges {
                email,
                password: None,
                name,
                role,
                avatar: avatar.map(Some),
                class_id: class_id.map(Some),
                teacher_id: teacher_id.map(Some),
                parent_id: parent_id.map(Some),
                student_ids,
                class_ids,
            };
            let user = users.update_user(id, changes).await?;
            print_user(&user)?;
        }
        Command::SetPassword { id, password } => {
            users.set_password(id, &password).await?;
            println!("Password updated!");
        }
        Command::Verify { email, password } => {
            match users.verify_credentials(&email, &password).await? {
                Some(user) => println!("Credentials valid for {} ({})", user.email, user.role),
                None => {
                    println!("Invalid email or password");
                    std::process::exit(1);
                }
            }
        }
        Command::Show { email } => match users.find_by_email(&email).await? {
            Some(user) => print_user(&user)?,
            None => println!("No user with email {}", email),
        },
        Command::Students { id } => {
            let user = users.get_user(id).await?;
            let students = relations.students_of(&user).await?;
            println!("Students ({})", students.len());
            for student in students {
                println!("- [{}] {} <{}>", student.id, student.name, student.email);
            }
        }
        Command::Delete { id } => {
            users.delete_user(id).await?;
            println!("User deleted!")
        }
    }

    Ok(())
}

fn print_user(user: &User) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(user)?);
    Ok(())
}
